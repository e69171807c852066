//! # USB listing diff
//!
//! Finds the vendor:product identifier of the device that appeared between two
//! `lsusb` captures.
//!
//! Each `lsusb` line looks like:
//!
//! ```text
//! Bus 001 Device 004: ID 0483:5740 STMicroelectronics Virtual COM Port
//! ```
//!
//! The two listings are merged into a [`PresenceTable`] which records, for every
//! distinct line, whether it was seen in the "before" capture, the "after"
//! capture, or both. Lines seen on one side only are the ones that changed.

use std::collections::HashMap;
use std::fmt::Display;

// Maximum number of hex digits in each half of a vendor:product token
const MAX_ID_DIGITS: usize = 4;

/// USB vendor and product identifier pair
///
/// Both halves are lowercase hexadecimal strings of 1 to 4 digits, exactly as
/// they appear in the `lsusb` listing (no `0x` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsbId {
    vendor: String,
    product: String,
}

impl UsbId {
    /// Create a UsbId from its two halves
    ///
    /// # Returns
    ///
    /// `None` if either half is not 1 to 4 hex digits
    pub fn new(vendor: &str, product: &str) -> Option<Self> {
        if is_id_half(vendor) && is_id_half(product) {
            Some(UsbId {
                vendor: vendor.to_ascii_lowercase(),
                product: product.to_ascii_lowercase(),
            })
        } else {
            None
        }
    }

    /// Parse a single `vendor:product` token such as `0483:5740`
    pub fn parse(token: &str) -> Option<Self> {
        let (vendor, product) = token.split_once(':')?;
        UsbId::new(vendor, product)
    }

    /// Find the first `vendor:product` token in an `lsusb` line
    ///
    /// Tokens are whitespace delimited, so `Device 004:` is never mistaken for
    /// an identifier.
    pub fn find_in_line(line: &str) -> Option<Self> {
        line.split_whitespace().find_map(UsbId::parse)
    }

    /// Vendor identifier, lowercase hex
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Product identifier, lowercase hex
    pub fn product(&self) -> &str {
        &self.product
    }
}

impl Display for UsbId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.vendor, self.product)
    }
}

fn is_id_half(s: &str) -> bool {
    (1..=MAX_ID_DIGITS).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Presence markers for one listing line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence {
    /// Line occurs in the capture taken before the device was connected
    pub in_before: bool,
    /// Line occurs in the capture taken after the device was connected
    pub in_after: bool,
}

impl Presence {
    /// Line occurs in exactly one of the two captures
    pub fn is_unique(&self) -> bool {
        self.in_before != self.in_after
    }
}

/// Which lines of two listings occur where
///
/// Keys are kept in first-insertion order: every line of the "before" listing,
/// then the lines only the "after" listing has. Each distinct line text is a
/// key exactly once.
#[derive(Debug, Default)]
pub struct PresenceTable {
    lines: Vec<String>,
    presence: HashMap<String, Presence>,
}

impl PresenceTable {
    /// Build the table from two raw listings
    ///
    /// # Arguments
    ///
    /// * `before` - Listing captured with the device disconnected
    /// * `after` - Listing captured with the device connected
    pub fn build(before: &str, after: &str) -> Self {
        let before_lines = listing_lines(before);
        let after_lines = listing_lines(after);

        let mut table = PresenceTable::default();

        for line in &before_lines {
            let in_after = after_lines.contains(line);
            table.record(line, |p| {
                p.in_before = true;
                p.in_after = in_after;
            });
        }

        for line in &after_lines {
            let in_before = before_lines.contains(line);
            table.record(line, |p| {
                p.in_after = true;
                p.in_before = in_before;
            });
        }

        table
    }

    fn record(&mut self, line: &str, update: impl FnOnce(&mut Presence)) {
        if !self.presence.contains_key(line) {
            self.lines.push(line.to_string());
        }
        update(self.presence.entry(line.to_string()).or_default());
    }

    #[cfg(test)]
    fn get(&self, line: &str) -> Option<Presence> {
        self.presence.get(line).copied()
    }

    /// Number of distinct lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when both listings were empty
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines present in only one of the listings, in table order
    pub fn unique_lines(&self) -> impl Iterator<Item = &str> {
        self.lines_where(Presence::is_unique)
    }

    /// Lines that appeared in the "after" listing
    pub fn added_lines(&self) -> impl Iterator<Item = &str> {
        self.lines_where(|p| p.in_after && !p.in_before)
    }

    /// Lines that disappeared from the "before" listing
    pub fn removed_lines(&self) -> impl Iterator<Item = &str> {
        self.lines_where(|p| p.in_before && !p.in_after)
    }

    fn lines_where(&self, pred: impl Fn(&Presence) -> bool) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(move |line| self.presence.get(line.as_str()).is_some_and(&pred))
            .map(String::as_str)
    }

    /// Identifier of the device that changed between the two listings
    ///
    /// Lines added in the "after" listing are tried first, so a device that
    /// was unplugged meanwhile never shadows the one just connected. Removed
    /// lines are only used when no added line carries an identifier. Lines
    /// without a `vendor:product` token are skipped.
    pub fn first_usb_id(&self) -> Option<UsbId> {
        self.added_lines()
            .find_map(UsbId::find_in_line)
            .or_else(|| self.removed_lines().find_map(UsbId::find_in_line))
    }
}

fn listing_lines(listing: &str) -> Vec<&str> {
    listing.lines().filter(|line| !line.trim().is_empty()).collect()
}

/// Find the identifier of the device that changed between two listings
///
/// # Arguments
///
/// * `before` - `lsusb` output with the drone disconnected
/// * `after` - `lsusb` output with the drone connected
///
/// # Returns
///
/// The identifier found on the first added line, else on the first removed
/// line, or `None` if the listings are identical or no changed line carries
/// an identifier
pub fn diff_listings(before: &str, after: &str) -> Option<UsbId> {
    PresenceTable::build(before, after).first_usb_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEFORE: &str = "Bus 001 Device 002: ID 1a2b:3c4d Foo\nBus 001 Device 003: ID 5e6f:7a8b Bar";

    fn after_with(line: &str) -> String {
        format!("{BEFORE}\n{line}\n")
    }

    #[test]
    fn test_identical_listings_find_nothing() {
        assert_eq!(diff_listings(BEFORE, BEFORE), None);
        assert_eq!(diff_listings("", ""), None);
    }

    #[test]
    fn test_flight_controller_is_found() {
        let after = after_with("Bus 001 Device 004: ID dead:beef Flight Controller");
        let id = diff_listings(BEFORE, &after).unwrap();
        assert_eq!(id.vendor(), "dead");
        assert_eq!(id.product(), "beef");
        assert_eq!(id.to_string(), "dead:beef");
    }

    #[test]
    fn test_added_line_without_identifier_is_not_a_crash() {
        let after = after_with("Bus 001 Device 004: something odd");
        assert_eq!(diff_listings(BEFORE, &after), None);
    }

    #[test]
    fn test_line_order_does_not_matter() {
        let after = "Bus 001 Device 003: ID 5e6f:7a8b Bar\n\
                     Bus 001 Device 004: ID 0483:5740 STM32 VCP\n\
                     Bus 001 Device 002: ID 1a2b:3c4d Foo";
        assert_eq!(diff_listings(BEFORE, after), UsbId::new("0483", "5740"));
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let before = format!("\n{BEFORE}\n\n   \n");
        assert_eq!(diff_listings(&before, BEFORE), None);
        assert!(PresenceTable::build(&before, BEFORE).get("").is_none());
    }

    #[test]
    fn test_table_keys_each_line_once() {
        let after = after_with("Bus 001 Device 004: ID dead:beef Flight Controller");
        let table = PresenceTable::build(BEFORE, &after);
        assert_eq!(table.len(), 3);

        let shared = table.get("Bus 001 Device 002: ID 1a2b:3c4d Foo").unwrap();
        assert!(shared.in_before && shared.in_after);
        assert!(!shared.is_unique());

        let added: Vec<_> = table.added_lines().collect();
        assert_eq!(added, vec!["Bus 001 Device 004: ID dead:beef Flight Controller"]);
        assert_eq!(table.removed_lines().count(), 0);
    }

    #[test]
    fn test_shared_line_keeps_both_markers() {
        // A line present on both sides must never be classified as unique
        // whatever order the passes touch it in.
        let before = "Bus 002 Device 001: ID 1d6b:0003 root hub\nBus 002 Device 001: ID 1d6b:0003 root hub";
        let after = "Bus 002 Device 001: ID 1d6b:0003 root hub";
        let table = PresenceTable::build(before, after);
        assert_eq!(table.len(), 1);
        assert_eq!(table.unique_lines().count(), 0);
    }

    #[test]
    fn test_removed_device_is_unique_too() {
        let before = after_with("Bus 001 Device 009: ID 046d:c52b Receiver");
        let table = PresenceTable::build(&before, BEFORE);
        let removed: Vec<_> = table.removed_lines().collect();
        assert_eq!(removed, vec!["Bus 001 Device 009: ID 046d:c52b Receiver"]);
        assert_eq!(table.first_usb_id(), UsbId::new("046d", "c52b"));
    }

    #[test]
    fn test_added_device_wins_over_removed_one() {
        let before = "Bus 001 Device 002: ID 1a2b:3c4d Foo\nBus 001 Device 009: ID 046d:c52b Receiver";
        let after = "Bus 001 Device 002: ID 1a2b:3c4d Foo\nBus 001 Device 010: ID 0483:5740 Flight Controller";
        assert_eq!(diff_listings(before, after), UsbId::new("0483", "5740"));
    }

    #[test]
    fn test_removed_device_used_when_added_line_has_no_id() {
        let before = "Bus 001 Device 002: ID 1a2b:3c4d Foo\nBus 001 Device 009: ID 046d:c52b Receiver";
        let after = "Bus 001 Device 002: ID 1a2b:3c4d Foo\nBus 001 Device 010: garbled";
        assert_eq!(diff_listings(before, after), UsbId::new("046d", "c52b"));
    }

    #[test]
    fn test_identifier_token_parsing() {
        assert_eq!(UsbId::parse("0483:5740"), UsbId::new("0483", "5740"));
        assert_eq!(UsbId::parse("10C4:EA60").unwrap().to_string(), "10c4:ea60");
        assert_eq!(UsbId::parse("1:2").unwrap().to_string(), "1:2");
        assert_eq!(UsbId::parse("002:"), None);
        assert_eq!(UsbId::parse(":beef"), None);
        assert_eq!(UsbId::parse("12345:0001"), None);
        assert_eq!(UsbId::parse("zzzz:0001"), None);
        assert_eq!(UsbId::parse("deadbeef"), None);
    }

    #[test]
    fn test_device_number_is_not_an_identifier() {
        let id = UsbId::find_in_line("Bus 003 Device 012: ID 0483:5740 STMicroelectronics");
        assert_eq!(id, UsbId::new("0483", "5740"));
        assert_eq!(UsbId::find_in_line("Bus 003 Device 012: no id here"), None);
    }
}
