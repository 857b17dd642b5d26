use std::fmt::Write;

/// Renders bytes as space separated uppercase hex pairs, e.g. `68 69 0A`.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut dump = String::with_capacity(bytes.len() * 3);
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            dump.push(' ');
        }
        let _ = write!(dump, "{byte:02X}");
    }
    dump
}
