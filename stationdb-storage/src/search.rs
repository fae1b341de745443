//! Ad hoc lookups across the most recent license data sets

use rusqlite::types::ValueRef;
use rusqlite::Row;
use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::{ExtDb, Registry};
use stationdb_core::{
    FormatType, StationDbError, StationDbResult, KEY_LIVE, KEY_MOST_RECENT_LICENSE_A,
    KEY_MOST_RECENT_LICENSE_B,
};

const EARTH_RADIUS_KM: f64 = 6371.0;

const LICENSE_A_ANTENNA_SQL: &str =
    "SELECT antenna_id, ant_make, ant_model_num FROM ant_make WHERE antenna_id = ?1";

const LICENSE_B_ANTENNA_SQL: &str =
    "SELECT antenna_id, manufacturer, model_number FROM lkp_antenna WHERE antenna_id = ?1";

const LICENSE_A_AM_SQL: &str = "
SELECT f.facility_id, f.fac_callsign, f.comm_city, f.comm_state,
       l.lat_dir, l.lat_deg, l.lat_min, l.lat_sec,
       l.lon_dir, l.lon_deg, l.lon_min, l.lon_sec
FROM facility f
JOIN application a ON a.facility_id = f.facility_id
JOIN app_location l ON l.application_id = a.application_id
WHERE f.fac_service = 'AM'";

const LICENSE_B_AM_SQL: &str = "
SELECT f.facility_id, f.callsign, f.community_served_city, f.community_served_state,
       l.aloc_lat_dir, l.aloc_lat_deg, l.aloc_lat_mm, l.aloc_lat_ss,
       l.aloc_long_dir, l.aloc_long_deg, l.aloc_long_mm, l.aloc_long_ss
FROM facility f
JOIN application a ON a.facility_id = f.facility_id
JOIN app_location l ON l.application_id = a.application_id
WHERE f.service_code = 'AM'";

#[derive(Debug, Clone, PartialEq)]
pub struct AntennaMatch {
    pub data_set_key: i32,
    pub data_set_label: String,
    pub format: FormatType,
    pub antenna_id: String,
    pub make: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmStation {
    pub data_set_key: i32,
    pub facility_id: i64,
    pub callsign: String,
    pub city: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

/// Look an antenna id up in the most recent license A and B data sets and on
/// the live server when one is configured
pub fn find_antennas(
    registry: &Registry,
    root_db: &str,
    antenna_id: &str,
) -> StationDbResult<Vec<AntennaMatch>> {
    let antenna_id = antenna_id.trim();
    let mut matches = Vec::new();
    for key in [KEY_MOST_RECENT_LICENSE_A, KEY_MOST_RECENT_LICENSE_B, KEY_LIVE] {
        let Some(handle) = optional_handle(registry, root_db, key)? else {
            continue;
        };
        let sql = match handle.format() {
            FormatType::LicenseA => LICENSE_A_ANTENNA_SQL,
            _ => LICENSE_B_ANTENNA_SQL,
        };
        let rows = query_handle(&handle, sql, [antenna_id], |row| {
            Ok((text(row, 0), text(row, 1), text(row, 2)))
        })?;
        for (id, make, model) in rows {
            matches.push(AntennaMatch {
                data_set_key: handle.key(),
                data_set_label: handle.label(),
                format: handle.format(),
                antenna_id: id,
                make,
                model,
            });
        }
    }
    tracing::debug!("Antenna {} found in {} places", antenna_id, matches.len());
    Ok(matches)
}

/// AM stations within `radius_km` of a point, nearest first
pub fn am_stations_near(
    registry: &Registry,
    root_db: &str,
    latitude: f64,
    longitude: f64,
    radius_km: f64,
) -> StationDbResult<Vec<AmStation>> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(StationDbError::InvalidInput(format!(
            "coordinates out of range: {}, {}",
            latitude, longitude
        )));
    }
    if radius_km < 0.0 {
        return Err(StationDbError::InvalidInput(format!(
            "negative search radius {}",
            radius_km
        )));
    }

    let mut stations = Vec::new();
    for key in [KEY_MOST_RECENT_LICENSE_A, KEY_MOST_RECENT_LICENSE_B] {
        let Some(handle) = optional_handle(registry, root_db, key)? else {
            continue;
        };
        let sql = match handle.format() {
            FormatType::LicenseA => LICENSE_A_AM_SQL,
            _ => LICENSE_B_AM_SQL,
        };
        let rows = query_handle(&handle, sql, [], |row| {
            let lat = dms_to_decimal(&text(row, 4), number(row, 5), number(row, 6), number(row, 7));
            let lon = dms_to_decimal(&text(row, 8), number(row, 9), number(row, 10), number(row, 11));
            Ok((number(row, 0) as i64, text(row, 1), text(row, 2), text(row, 3), lat, lon))
        })?;

        // A facility can have several applications; keep its nearest location
        let mut nearest: HashMap<i64, AmStation> = HashMap::new();
        for (facility_id, callsign, city, state, lat, lon) in rows {
            let distance_km = haversine_km(latitude, longitude, lat, lon);
            if distance_km > radius_km {
                continue;
            }
            let closer = nearest
                .get(&facility_id)
                .map_or(true, |seen| distance_km < seen.distance_km);
            if closer {
                nearest.insert(
                    facility_id,
                    AmStation {
                        data_set_key: handle.key(),
                        facility_id,
                        callsign,
                        city,
                        state,
                        latitude: lat,
                        longitude: lon,
                        distance_km,
                    },
                );
            }
        }
        stations.extend(nearest.into_values());
    }

    stations.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(stations)
}

pub fn has_am_station_near(
    registry: &Registry,
    root_db: &str,
    latitude: f64,
    longitude: f64,
    radius_km: f64,
) -> StationDbResult<bool> {
    Ok(!am_stations_near(registry, root_db, latitude, longitude, radius_km)?.is_empty())
}

/// Great-circle distance on a spherical earth
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Degrees/minutes/seconds to signed decimal degrees; S and W are negative
pub fn dms_to_decimal(direction: &str, degrees: f64, minutes: f64, seconds: f64) -> f64 {
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    match direction.trim().to_ascii_uppercase().as_str() {
        "S" | "W" => -value,
        _ => value,
    }
}

/// Reserved handles come and go with the data; an absent one is skipped
fn optional_handle(registry: &Registry, root_db: &str, key: i32) -> StationDbResult<Option<Arc<ExtDb>>> {
    match registry.resolve_by_key(root_db, key, false) {
        Ok(handle) => Ok(Some(handle)),
        Err(StationDbError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn query_handle<T, P, F>(handle: &ExtDb, sql: &str, params: P, f: F) -> StationDbResult<Vec<T>>
where
    P: rusqlite::Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let conn = handle.connect(false)?;
    let rows = conn.query_map(sql, params, format!("searching {}", handle.store_name()), f);
    handle.release(conn)?;
    rows
}

fn text(row: &Row<'_>, idx: usize) -> String {
    match row.get_ref(idx) {
        Ok(ValueRef::Text(bytes)) => String::from_utf8_lossy(bytes).trim().to_string(),
        Ok(ValueRef::Integer(i)) => i.to_string(),
        Ok(ValueRef::Real(r)) => r.to_string(),
        _ => String::new(),
    }
}

/// Numeric columns may hold quoted text when the dump carried junk
fn number(row: &Row<'_>, idx: usize) -> f64 {
    match row.get_ref(idx) {
        Ok(ValueRef::Integer(i)) => i as f64,
        Ok(ValueRef::Real(r)) => r,
        Ok(ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}
