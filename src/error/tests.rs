//! Tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("root cannot be empty");
        assert_eq!(err.to_string(), "configuration error: root cannot be empty");
    }

    #[test]
    fn test_registry_error_invalid_path() {
        let err = RegistryError::invalid_path("/tmp/..", "no file name");
        assert_eq!(err.to_string(), "invalid path '/tmp/..': no file name");
    }

    #[test]
    fn test_registry_error_duplicate_name() {
        let err = RegistryError::DuplicateName {
            name: "report.csv".to_string(),
            directory: "inbound".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate file name 'report.csv' in directory 'inbound'"
        );
    }

    #[test]
    fn test_registry_error_conversion() {
        let reg_err = RegistryError::invalid_path("x", "bad");
        let err: Error = reg_err.into();
        assert!(matches!(err, Error::Registry(_)));
    }

    #[test]
    fn test_watch_error_conversion() {
        let watch_err = WatchError::WatchFailed {
            path: "/tmp/test".to_string(),
            reason: "permission denied".to_string(),
        };
        let err: Error = watch_err.into();
        assert!(matches!(err, Error::Watch(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(Error::config("test error"))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::Internal("something went wrong".to_string());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("Internal"));
        assert!(debug_str.contains("something went wrong"));
    }
}
