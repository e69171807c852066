//! # Kernel log scanning
//!
//! When `usbserial` binds to a device the kernel logs a line such as
//!
//! ```text
//! [ 8123.456] usb 1-1: generic converter now attached to ttyUSB0
//! [ 8123.457] usbserial_generic 1-1:1.0: generic converter detected
//! [ 8124.001] cdc_acm 1-2:1.0: ttyACM0: USB ACM device
//! ```
//!
//! This module picks the tty node name out of such lines.

const TTY_PREFIX: &str = "tty";
// Uppercase letters allowed between "tty" and the node number (USB, ACM, S, ...)
const MAX_TTY_LETTERS: usize = 3;

/// Kernel log lines that can name a USB serial node
///
/// Keeps only lines containing both `USB` and `tty`.
pub fn usb_tty_lines(log: &str) -> impl Iterator<Item = &str> {
    log.lines().filter(|line| line.contains("USB") && line.contains("tty"))
}

/// Find the most recent tty node named in a kernel log
///
/// Looks for tokens of the form `tty` + up to three uppercase letters + one
/// digit + `:` (e.g. `ttyUSB0:`, `ttyACM1:`, `ttyS0:`) on lines mentioning both
/// `USB` and `tty`. The kernel log is chronological, so the last match is the
/// device attached most recently.
///
/// # Returns
///
/// The node name without the trailing colon, or `None` if no line matches
pub fn find_tty_node(log: &str) -> Option<String> {
    usb_tty_lines(log)
        .filter_map(|line| tty_tokens(line).last())
        .last()
        .map(str::to_string)
}

// All `ttyXXXN` names in a line that are followed by a colon
fn tty_tokens(line: &str) -> impl Iterator<Item = &str> {
    line.match_indices(TTY_PREFIX)
        .filter_map(move |(start, _)| match_tty_at(line, start))
}

fn match_tty_at(line: &str, start: usize) -> Option<&str> {
    let bytes = line.as_bytes();
    let mut pos = start + TTY_PREFIX.len();

    let letters = bytes[pos..]
        .iter()
        .take(MAX_TTY_LETTERS)
        .take_while(|b| b.is_ascii_uppercase())
        .count();
    pos += letters;

    if !bytes.get(pos).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    pos += 1;

    if bytes.get(pos) != Some(&b':') {
        return None;
    }

    Some(&line[start..pos])
}
