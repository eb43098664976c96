use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};

use crate::errors::Error;
use crate::schema;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub fn get_pool() -> Result<PgPool, Error> {
    let url =
        std::env::var("DATABASE_URL").map_err(|_| Error::NotConnected("DATABASE_URL is not set".to_string()))?;
    let manager = ConnectionManager::<PgConnection>::new(url);
    let pool = Pool::builder().build(manager)?;
    Ok(pool)
}

/// Checked once at run start so a bad DSN fails the run before any archive
/// work begins.
pub fn ping(pool: &PgPool) -> Result<(), Error> {
    let mut conn = pool.get().map_err(|err| Error::NotConnected(err.to_string()))?;
    diesel::sql_query("SELECT 1")
        .execute(&mut conn)
        .map_err(|err| Error::NotConnected(err.to_string()))?;
    Ok(())
}

pub fn name_index_count(pool: &PgPool, source_id: i32) -> Result<i64, Error> {
    use schema::name_string_indices::dsl::*;

    let mut conn = pool.get()?;
    let total = name_string_indices
        .filter(data_source_id.eq(source_id))
        .count()
        .get_result::<i64>(&mut conn)?;
    Ok(total)
}

pub fn vernacular_index_count(pool: &PgPool, source_id: i32) -> Result<i64, Error> {
    use schema::vernacular_string_indices::dsl::*;

    let mut conn = pool.get()?;
    let total = vernacular_string_indices
        .filter(data_source_id.eq(source_id))
        .count()
        .get_result::<i64>(&mut conn)?;
    Ok(total)
}

/// Every per-source load starts by clearing that source's rows, which is
/// what makes a re-run land on identical state.
pub fn delete_name_indices(pool: &PgPool, source_id: i32) -> Result<usize, Error> {
    use schema::name_string_indices::dsl::*;

    let mut conn = pool.get()?;
    let deleted = diesel::delete(name_string_indices.filter(data_source_id.eq(source_id))).execute(&mut conn)?;
    Ok(deleted)
}

pub fn delete_vernacular_indices(pool: &PgPool, source_id: i32) -> Result<usize, Error> {
    use schema::vernacular_string_indices::dsl::*;

    let mut conn = pool.get()?;
    let deleted =
        diesel::delete(vernacular_string_indices.filter(data_source_id.eq(source_id))).execute(&mut conn)?;
    Ok(deleted)
}

pub fn delete_data_source(pool: &PgPool, source_id: i32) -> Result<usize, Error> {
    use schema::data_sources::dsl::*;

    let mut conn = pool.get()?;
    let deleted = diesel::delete(data_sources.filter(id.eq(source_id))).execute(&mut conn)?;
    Ok(deleted)
}
