//! Asset upsert and lookup

use super::models::Asset;
use crate::db::{from_millis, to_millis};
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const ASSET_COLUMNS: &str = "id, symbol, name, current_price, market_cap, market_cap_rank,
    price_change_percentage_24h, total_volume, circulating_supply, total_supply, max_supply,
    last_updated";

fn row_to_asset(row: &Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        current_price: row.get(3)?,
        market_cap: row.get(4)?,
        market_cap_rank: row.get(5)?,
        price_change_percentage_24h: row.get(6)?,
        total_volume: row.get(7)?,
        circulating_supply: row.get(8)?,
        total_supply: row.get(9)?,
        max_supply: row.get(10)?,
        last_updated: from_millis(row.get(11)?),
    })
}

/// Insert or fully update an asset. Returns true if it was new.
pub fn upsert_asset(conn: &Connection, asset: &Asset) -> Result<bool> {
    let existed: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM assets WHERE id = ?1)",
        [&asset.id],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO assets (id, symbol, name, current_price, market_cap, market_cap_rank,
             price_change_percentage_24h, total_volume, circulating_supply, total_supply,
             max_supply, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
             symbol = excluded.symbol,
             name = excluded.name,
             current_price = excluded.current_price,
             market_cap = excluded.market_cap,
             market_cap_rank = excluded.market_cap_rank,
             price_change_percentage_24h = excluded.price_change_percentage_24h,
             total_volume = excluded.total_volume,
             circulating_supply = excluded.circulating_supply,
             total_supply = excluded.total_supply,
             max_supply = excluded.max_supply,
             last_updated = excluded.last_updated",
        params![
            asset.id,
            asset.symbol,
            asset.name,
            asset.current_price,
            asset.market_cap,
            asset.market_cap_rank,
            asset.price_change_percentage_24h,
            asset.total_volume,
            asset.circulating_supply,
            asset.total_supply,
            asset.max_supply,
            to_millis(&asset.last_updated),
        ],
    )?;

    Ok(!existed)
}

pub fn get_asset(conn: &Connection, id: &str) -> Result<Option<Asset>> {
    let sql = format!("SELECT {} FROM assets WHERE id = ?1", ASSET_COLUMNS);
    let asset = conn.query_row(&sql, [id], row_to_asset).optional()?;
    Ok(asset)
}

/// All assets, best market-cap rank first
pub fn list_assets(conn: &Connection) -> Result<Vec<Asset>> {
    let sql = format!(
        "SELECT {} FROM assets ORDER BY market_cap_rank IS NULL, market_cap_rank ASC, id ASC",
        ASSET_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let assets = stmt
        .query_map([], row_to_asset)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(assets)
}
