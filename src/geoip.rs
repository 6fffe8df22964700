use cadence::{prelude::*, StatsdClient};
use serde_derive::Serialize;
use std::{net::IpAddr, sync::Arc};

use crate::{
    data_dir::DataDirectory,
    errors::{ErrorKind, UpdaterError},
};

/// A City database record, passed through as decoded.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LocationRecord(serde_json::Value);

impl LocationRecord {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn country_iso_code(&self) -> Option<&str> {
        self.0.pointer("/country/iso_code").and_then(|code| code.as_str())
    }
}

/// Answers IP to city queries against the City database in the data directory.
pub struct GeoIpLookup {
    data_dir: DataDirectory,
    metrics: Arc<StatsdClient>,
}

impl GeoIpLookup {
    pub fn builder() -> GeoIpLookupBuilder {
        GeoIpLookupBuilder::default()
    }

    /// Look up `ip`. Empty input is not an error and yields `None`.
    ///
    /// The database is opened on every call, so a refresh is picked up by
    /// the next lookup.
    pub fn ip_to_city(&self, ip: &str) -> Result<Option<LocationRecord>, UpdaterError> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Ok(None);
        }
        let address: IpAddr = ip.parse()?;

        let reader = maxminddb::Reader::open_readfile(self.data_dir.city_database_path())?;
        let record = reader
            .lookup::<serde_json::Value>(address)?
            .map(LocationRecord::new)
            .ok_or_else(|| {
                UpdaterError::new(
                    ErrorKind::LookupFailed,
                    format!("AddressNotFound: {} is not in the database", address),
                )
            });

        let country = match &record {
            Ok(location) => location.country_iso_code().unwrap_or("unknown"),
            Err(_) => "unknown",
        };
        self.metrics
            .incr_with_tags("lookup")
            .with_tag("country", country)
            .send();

        record.map(Some)
    }
}

#[derive(Default)]
pub struct GeoIpLookupBuilder {
    data_dir: Option<DataDirectory>,
    metrics: Option<Arc<StatsdClient>>,
}

impl GeoIpLookupBuilder {
    pub fn data_dir(mut self, data_dir: DataDirectory) -> Self {
        self.data_dir = Some(data_dir);
        self
    }

    pub fn metrics(mut self, metrics: Arc<StatsdClient>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> GeoIpLookup {
        let data_dir = self
            .data_dir
            .unwrap_or_else(|| DataDirectory::new(crate::settings::Settings::default().data_dir));

        let metrics = self.metrics.unwrap_or_else(crate::metrics::nop_client);

        GeoIpLookup { data_dir, metrics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::TestMetricSink;
    use serde_json::json;
    use std::{ops::Deref, path::Path, sync::Mutex};

    /// MaxMind DB data section encodings, enough for a small City database.
    fn text(value: &str) -> Vec<u8> {
        assert!(value.len() < 29);
        let mut out = vec![0x40 | value.len() as u8];
        out.extend_from_slice(value.as_bytes());
        out
    }

    fn map(entries: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
        let mut out = vec![0xe0 | entries.len() as u8];
        for (key, value) in entries {
            out.extend(text(key));
            out.extend(value);
        }
        out
    }

    fn array(items: Vec<Vec<u8>>) -> Vec<u8> {
        let mut out = vec![items.len() as u8, 0x04];
        for item in items {
            out.extend(item);
        }
        out
    }

    fn uint16(value: u16) -> Vec<u8> {
        let mut out = vec![0xa2];
        out.extend_from_slice(&value.to_be_bytes());
        out
    }

    fn uint32(value: u32) -> Vec<u8> {
        let mut out = vec![0xc4];
        out.extend_from_slice(&value.to_be_bytes());
        out
    }

    fn uint64(value: u64) -> Vec<u8> {
        let mut out = vec![0x08, 0x02];
        out.extend_from_slice(&value.to_be_bytes());
        out
    }

    /// Write an IPv4 City database holding one record for 0.0.0.0/1
    /// (Minneapolis, US). Addresses from 128.0.0.0 up are not in it.
    fn write_city_database(path: &Path) -> std::io::Result<()> {
        let node_count = 1u32;
        let mut db = Vec::new();
        // One node with 24-bit records: left points at data offset 0,
        // right is the "not found" marker.
        let data_pointer = node_count + 16;
        db.extend_from_slice(&data_pointer.to_be_bytes()[1..]);
        db.extend_from_slice(&node_count.to_be_bytes()[1..]);
        db.extend_from_slice(&[0u8; 16]);
        db.extend(map(vec![
            (
                "city",
                map(vec![("names", map(vec![("en", text("Minneapolis"))]))]),
            ),
            ("country", map(vec![("iso_code", text("US"))])),
        ]));
        db.extend_from_slice(b"\xab\xcd\xefMaxMind.com");
        db.extend(map(vec![
            ("binary_format_major_version", uint16(2)),
            ("binary_format_minor_version", uint16(0)),
            ("build_epoch", uint64(1_700_000_000)),
            ("database_type", text("GeoLite2-City")),
            ("description", map(vec![("en", text("test database"))])),
            ("ip_version", uint16(4)),
            ("languages", array(vec![text("en")])),
            ("node_count", uint32(node_count)),
            ("record_size", uint16(24)),
        ]));
        std::fs::write(path, db)
    }

    #[test]
    fn empty_ip_is_absent_without_opening_database() -> Result<(), Box<dyn std::error::Error>> {
        let lookup = GeoIpLookup::builder()
            .data_dir(DataDirectory::new("/nonexistent/geoip-data"))
            .build();

        assert_eq!(lookup.ip_to_city("")?, None);
        assert_eq!(lookup.ip_to_city("   ")?, None);
        Ok(())
    }

    #[test]
    fn invalid_ip_is_reported() {
        let lookup = GeoIpLookup::builder()
            .data_dir(DataDirectory::new("/nonexistent/geoip-data"))
            .build();

        let err = lookup.ip_to_city("999.1.1.1").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LookupFailed);
        assert!(err.message().starts_with("InvalidAddress"));
    }

    #[test]
    fn missing_database_is_a_lookup_failure() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = tempfile::tempdir()?;
        let log = Arc::new(Mutex::new(Vec::new()));
        let lookup = GeoIpLookup::builder()
            .data_dir(DataDirectory::new(scratch.path()))
            .metrics(Arc::new(StatsdClient::from_sink(
                "test",
                TestMetricSink { log: log.clone() },
            )))
            .build();

        let err = lookup.ip_to_city("1.2.3.4").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LookupFailed);
        assert!(log.lock().unwrap().is_empty(), "no lookup happened");
        Ok(())
    }

    #[test]
    fn corrupt_database_is_a_lookup_failure() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = tempfile::tempdir()?;
        let data_dir = DataDirectory::new(scratch.path());
        std::fs::write(data_dir.city_database_path(), b"not an mmdb file")?;
        let lookup = GeoIpLookup::builder().data_dir(data_dir).build();

        let err = lookup.ip_to_city("1.2.3.4").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LookupFailed);
        Ok(())
    }

    #[test]
    fn finds_city_record() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = tempfile::tempdir()?;
        let data_dir = DataDirectory::new(scratch.path());
        write_city_database(&data_dir.city_database_path())?;
        let lookup = GeoIpLookup::builder().data_dir(data_dir).build();

        let record = lookup.ip_to_city("1.2.3.4")?.expect("record for 1.2.3.4");

        assert_eq!(record.country_iso_code(), Some("US"));
        assert_eq!(
            serde_json::to_value(&record)?["city"]["names"]["en"],
            "Minneapolis"
        );
        Ok(())
    }

    #[test]
    fn unknown_address_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = tempfile::tempdir()?;
        let data_dir = DataDirectory::new(scratch.path());
        write_city_database(&data_dir.city_database_path())?;
        let lookup = GeoIpLookup::builder().data_dir(data_dir).build();

        let err = lookup.ip_to_city("200.1.1.1").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LookupFailed);
        assert!(err.message().starts_with("AddressNotFound"));
        Ok(())
    }

    #[test]
    fn lookups_send_metrics() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = tempfile::tempdir()?;
        let data_dir = DataDirectory::new(scratch.path());
        write_city_database(&data_dir.city_database_path())?;
        let log = Arc::new(Mutex::new(Vec::new()));
        let lookup = GeoIpLookup::builder()
            .data_dir(data_dir)
            .metrics(Arc::new(StatsdClient::from_sink(
                "test",
                TestMetricSink { log: log.clone() },
            )))
            .build();

        lookup.ip_to_city("1.2.3.4")?;
        lookup.ip_to_city("200.1.1.1").unwrap_err();

        assert_eq!(
            *log.lock().unwrap().deref(),
            vec![
                "test.lookup:1|c|#country:US",
                "test.lookup:1|c|#country:unknown",
            ]
        );
        Ok(())
    }

    #[test]
    fn record_exposes_country_code() {
        let record = LocationRecord::new(json!({
            "city": { "names": { "en": "Minneapolis" } },
            "country": { "iso_code": "US", "names": { "en": "United States" } },
        }));
        assert_eq!(record.country_iso_code(), Some("US"));
        assert_eq!(
            serde_json::to_value(&record).unwrap()["city"]["names"]["en"],
            "Minneapolis"
        );
        assert_eq!(LocationRecord::new(json!({})).country_iso_code(), None);
    }
}
