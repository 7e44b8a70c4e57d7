#[cfg(test)]
mod export_tests {
    use chrono::{Local, TimeZone};

    use crate::models::form::{empty_metadata, FormSubmission};
    use crate::services::export::{
        format_created_at, range_export, single_export, EXPORT_HEADERS,
    };

    fn sample(id: &str, instagram: &str) -> FormSubmission {
        FormSubmission {
            id: id.to_string(),
            instagram: instagram.to_string(),
            recipient_name: "María López".to_string(),
            desired_date: "2025-04-01".to_string(),
            desired_time: "15:30".to_string(),
            address: "Calle Falsa 123, Rosario".to_string(),
            additional_notes: "sin timbre".to_string(),
            coupon_code: Some("CUPON10".to_string()),
            metadata: empty_metadata(),
            created_at: "2025-03-05T12:00:00+00:00".to_string(),
        }
    }

    fn parse_rows(bytes: &[u8]) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes);
        reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }

    #[test]
    fn test_single_export_filename_uses_handle_and_id_prefix() {
        let file = single_export(&sample("abcdef1234567890", "@maria")).unwrap();
        assert_eq!(file.filename, "registro-@maria-abcdef12.csv");
    }

    #[test]
    fn test_single_export_without_instagram_handle() {
        let file = single_export(&sample("abcdef1234567890", "")).unwrap();
        assert_eq!(file.filename, "registro-sin-instagram-abcdef12.csv");
    }

    #[test]
    fn test_workbook_layout() {
        let submission = sample("abcdef1234567890", "@maria");
        let file = single_export(&submission).unwrap();

        let rows = parse_rows(&file.bytes);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], EXPORT_HEADERS);

        let row = &rows[1];
        assert_eq!(row[0], "@maria");
        assert_eq!(row[1], "María López");
        assert_eq!(row[2], "2025-04-01");
        assert_eq!(row[3], "15:30");
        assert_eq!(row[4], "Calle Falsa 123, Rosario");
        assert_eq!(row[5], "CUPON10");
        assert_eq!(row[6], "sin timbre");
        assert_eq!(row[7], format_created_at("2025-03-05T12:00:00+00:00"));
    }

    #[test]
    fn test_missing_coupon_exports_as_empty_cell() {
        let mut submission = sample("abcdef1234567890", "@maria");
        submission.coupon_code = None;

        let file = single_export(&submission).unwrap();
        let rows = parse_rows(&file.bytes);
        assert_eq!(rows[1][5], "");
    }

    #[test]
    fn test_range_export_filename_and_rows() {
        let submissions = vec![
            sample("aaaaaaaa11111111", "@primera"),
            sample("bbbbbbbb22222222", "@segunda"),
        ];
        let start = "2025-03-01".parse().unwrap();
        let end = "2025-03-15".parse().unwrap();

        let file = range_export(&submissions, start, end).unwrap();
        assert_eq!(file.filename, "registros-01-03-2025-15-03-2025.csv");

        let rows = parse_rows(&file.bytes);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "@primera");
        assert_eq!(rows[2][0], "@segunda");
    }

    #[test]
    fn test_format_created_at_renders_local_day_first() {
        let local = Local.with_ymd_and_hms(2025, 3, 5, 14, 30, 0).unwrap();
        assert_eq!(format_created_at(&local.to_rfc3339()), "05/03/2025 14:30:00");
    }

    #[test]
    fn test_format_created_at_falls_back_to_raw_value() {
        assert_eq!(format_created_at("no es una fecha"), "no es una fecha");
    }
}
