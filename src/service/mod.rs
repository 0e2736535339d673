//! Request-independent operations over the store. Handlers in `api` call
//! these.

pub mod accounts;
pub mod admin;
pub mod alerts;
pub mod devices;
pub mod notifications;
pub mod residents;
pub mod subscriptions;

/// Trims and drops empty strings, the way every form field is read.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::non_empty;

    #[test]
    fn blank_strings_are_absent() {
        assert_eq!(non_empty(Some("  201 ".to_string())), Some("201".to_string()));
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(None), None);
    }
}
