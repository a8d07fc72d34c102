use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeysLookupStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "fail")]
    Fail,
    #[serde(rename = "nomatch")]
    NoMatch,
}

impl fmt::Display for KeysLookupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::NoMatch => "nomatch",
        })
    }
}

/// One row of a keys file: the peril/vulnerability resolution of a single
/// location coverage. Unmatched rows are kept with empty identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysRecord {
    #[serde(rename = "LocID")]
    pub loc_id: String,
    #[serde(rename = "PerilID")]
    pub peril_id: String,
    #[serde(rename = "CoverageID")]
    pub coverage_type: u32,
    #[serde(rename = "AreaPerilID")]
    pub area_peril_id: Option<u64>,
    #[serde(rename = "VulnerabilityID")]
    pub vulnerability_id: Option<u64>,
    #[serde(rename = "Status")]
    pub status: KeysLookupStatus,
    #[serde(rename = "Message", default)]
    pub message: String,
}

impl KeysRecord {
    pub fn matched(
        loc_id: impl Into<String>,
        peril_id: impl Into<String>,
        coverage_type: u32,
        area_peril_id: u64,
        vulnerability_id: u64,
    ) -> Self {
        Self {
            loc_id: loc_id.into(),
            peril_id: peril_id.into(),
            coverage_type,
            area_peril_id: Some(area_peril_id),
            vulnerability_id: Some(vulnerability_id),
            status: KeysLookupStatus::Success,
            message: String::new(),
        }
    }

    pub fn unmatched(
        loc_id: impl Into<String>,
        peril_id: impl Into<String>,
        coverage_type: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            loc_id: loc_id.into(),
            peril_id: peril_id.into(),
            coverage_type,
            area_peril_id: None,
            vulnerability_id: None,
            status: KeysLookupStatus::NoMatch,
            message: message.into(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == KeysLookupStatus::Success
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysSummary {
    pub matched: u64,
    pub unmatched: u64,
}

impl KeysSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a KeysRecord>) -> Self {
        records
            .into_iter()
            .fold(Self::default(), |mut summary, record| {
                if record.is_match() {
                    summary.matched += 1;
                } else {
                    summary.unmatched += 1;
                }
                summary
            })
    }

    pub fn total(&self) -> u64 {
        self.matched + self.unmatched
    }
}
