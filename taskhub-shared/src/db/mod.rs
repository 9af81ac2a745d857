/// Database layer for TaskHub
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health check
/// - `migrations`: embedded migration runner
///
/// Entity reads and writes go through [`crate::repository`].

pub mod migrations;
pub mod pool;
