//! Asset profile upsert and lookup

use super::models::AssetProfile;
use crate::db::{from_millis, to_millis};
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Insert or replace the profile for an asset
pub fn upsert_asset_profile(conn: &Connection, profile: &AssetProfile) -> Result<()> {
    let categories = serde_json::to_string(&profile.categories)?;
    conn.execute(
        "INSERT INTO asset_profiles (asset_id, description, categories, homepage, all_time_high,
             all_time_low, price_change_percentage_7d, price_change_percentage_30d, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(asset_id) DO UPDATE SET
             description = excluded.description,
             categories = excluded.categories,
             homepage = excluded.homepage,
             all_time_high = excluded.all_time_high,
             all_time_low = excluded.all_time_low,
             price_change_percentage_7d = excluded.price_change_percentage_7d,
             price_change_percentage_30d = excluded.price_change_percentage_30d,
             updated_at = excluded.updated_at",
        params![
            profile.asset_id,
            profile.description,
            categories,
            profile.homepage,
            profile.all_time_high,
            profile.all_time_low,
            profile.price_change_percentage_7d,
            profile.price_change_percentage_30d,
            to_millis(&profile.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_asset_profile(conn: &Connection, asset_id: &str) -> Result<Option<AssetProfile>> {
    let row = conn
        .query_row(
            "SELECT asset_id, description, categories, homepage, all_time_high, all_time_low,
                 price_change_percentage_7d, price_change_percentage_30d, updated_at
             FROM asset_profiles WHERE asset_id = ?1",
            [asset_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<f64>>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                    row.get::<_, i64>(8)?,
                ))
            },
        )
        .optional()?;

    let Some((asset_id, description, categories_json, homepage, ath, atl, pct_7d, pct_30d, updated_at)) =
        row
    else {
        return Ok(None);
    };

    let categories: Vec<String> = serde_json::from_str(&categories_json)
        .map_err(|e| AppError::DataShape(format!("profile categories '{}': {}", categories_json, e)))?;

    Ok(Some(AssetProfile {
        asset_id,
        description,
        categories,
        homepage,
        all_time_high: ath,
        all_time_low: atl,
        price_change_percentage_7d: pct_7d,
        price_change_percentage_30d: pct_30d,
        updated_at: from_millis(updated_at),
    }))
}
