//! CSV export of the device listing

use crate::db::devices::DeviceRow;
use crate::license::format_date;

const HEADER: &str = "id,tenant,fingerprint,status,created,expiry";

/// Render devices as CSV with a header row; line endings are `\r\n`
pub fn devices_csv(rows: &[DeviceRow]) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    out.push_str(HEADER);
    out.push_str("\r\n");
    for row in rows {
        let status = if row.active { "ACTIVE" } else { "BLOCKED" };
        let expiry = row.expires_at.map(format_date).unwrap_or_default();
        let fields = [
            row.id.to_string(),
            escape(&row.tenant_name),
            escape(&row.fingerprint),
            status.to_string(),
            format_date(row.created_at),
            expiry,
        ];
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }
    out
}

/// RFC 4180 quoting: wrap in quotes when needed, double inner quotes
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
