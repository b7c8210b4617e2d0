//! Provider time-series document (USGS WaterML 1.1 JSON rendering)
//!
//! Only the fields the encoder reads are modelled; everything else in the
//! payload (queryInfo, qualifiers, methods, ...) is ignored by serde. Both the
//! instantaneous (`/nwis/iv`) and daily (`/nwis/dv`) services return this shape.
//!
//! A JSON `null` decodes the same as a missing field, so one null point does
//! not reject the whole document.

use serde::{Deserialize, Deserializer};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaterDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: DocumentBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentBody {
    #[serde(default, deserialize_with = "null_as_default", rename = "timeSeries")]
    pub time_series: Vec<TimeSeries>,
}

/// One named series: a site, a variable, and its value blocks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSeries {
    #[serde(default, deserialize_with = "null_as_default", rename = "sourceInfo")]
    pub source_info: SourceInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variable: Variable,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<ValueBlock>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl TimeSeries {
    /// First site code, or empty when the provider sent none
    pub fn site_id(&self) -> &str {
        self.source_info
            .site_code
            .first()
            .map(|c| c.value.as_str())
            .unwrap_or("")
    }

    pub fn latitude(&self) -> f64 {
        self.source_info
            .geo_location
            .geog_location
            .latitude
            .unwrap_or(0.0)
    }

    pub fn longitude(&self) -> f64 {
        self.source_info
            .geo_location
            .geog_location
            .longitude
            .unwrap_or(0.0)
    }

    pub fn unit(&self) -> &str {
        &self.variable.unit.unit_code
    }

    /// All points across value blocks, in document order
    pub fn points(&self) -> impl Iterator<Item = &ValuePoint> {
        self.values.iter().flat_map(|block| block.value.iter())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceInfo {
    #[serde(default, deserialize_with = "null_as_default", rename = "siteName")]
    pub site_name: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "siteCode")]
    pub site_code: Vec<SiteCode>,
    #[serde(default, deserialize_with = "null_as_default", rename = "geoLocation")]
    pub geo_location: GeoLocation,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteCode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoLocation {
    #[serde(default, deserialize_with = "null_as_default", rename = "geogLocation")]
    pub geog_location: GeogLocation,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeogLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Variable {
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: Unit,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Unit {
    #[serde(default, deserialize_with = "null_as_default", rename = "unitCode")]
    pub unit_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueBlock {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: Vec<ValuePoint>,
}

/// One reported instant; qualifier flags are not read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValuePoint {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "dateTime")]
    pub date_time: String,
}
