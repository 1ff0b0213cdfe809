//! Common utilities for the raceline toolkit

pub mod error;

pub use error::{suggest_column, Error, Result};

#[cfg(test)]
mod tests {
    use crate::error::suggest_column;

    #[test]
    fn suggest_column_returns_expected_header() {
        let found = vec!["local_x".to_string(), "local_y".to_string()];
        assert_eq!(suggest_column("locl_x", &found), Some("local_x".to_string()));
    }
}
