//! Natural ordering for page names inside an archive.
//!
//! Comic pages are rarely zero-padded consistently. Scanners and rippers
//! produce `page1.jpg … page10.jpg`, so plain byte ordering would put
//! `page10` before `page2`. Natural ordering compares embedded digit runs as
//! integers instead:
//!
//! - `"page2.jpg"` < `"page10.jpg"`
//! - `"ch1/p9.png"` < `"ch1/p10.png"` < `"ch2/p1.png"`
//! - `"a"` < `"ab"` (a clean prefix sorts first)
//! - `"p1"` < `"p01"` (numerically equal: shorter first)
//!
//! Digit runs are compared by value without parsing into a fixed-width
//! integer, so arbitrarily long runs (`"00000000000000000000042"`) never
//! overflow.

use std::cmp::Ordering;

/// Compare two strings in natural order.
///
/// Walks both strings byte by byte. When both sides are at an ASCII digit,
/// the full digit run is consumed from each side and the runs are compared
/// numerically; equal values continue scanning after the runs. Otherwise the
/// bytes are compared directly. When either side runs out first, the side
/// with text left over is greater: `"p001" < "p1a"`, although `"p001"` is
/// the longer string. Comparing total lengths at that point instead would
/// not be transitive (`"1a10" < "1aa" < "001a"` but `"1a10" > "001a"`), and
/// `slice::sort_by` requires a total order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut ai, mut bi) = (0, 0);

    while ai < a.len() && bi < b.len() {
        if a[ai].is_ascii_digit() && b[bi].is_ascii_digit() {
            let a_end = digit_run_end(a, ai);
            let b_end = digit_run_end(b, bi);
            match compare_digit_runs(&a[ai..a_end], &b[bi..b_end]) {
                Ordering::Equal => {
                    ai = a_end;
                    bi = b_end;
                }
                other => return other,
            }
        } else {
            match a[ai].cmp(&b[bi]) {
                Ordering::Equal => {
                    ai += 1;
                    bi += 1;
                }
                other => return other,
            }
        }
    }

    // The side with bytes remaining is longer. Names that are numerically
    // equal ("p1" vs "p01") are ordered by total length, then bytewise.
    (a.len() - ai)
        .cmp(&(b.len() - bi))
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.cmp(b))
}

fn digit_run_end(s: &[u8], start: usize) -> usize {
    s[start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(s.len(), |offset| start + offset)
}

/// Compare two runs of ASCII digits by numeric value.
fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(run: &[u8]) -> &[u8] {
    let first_significant = run.iter().position(|&c| c != b'0').unwrap_or(run.len());
    &run[first_significant..]
}
