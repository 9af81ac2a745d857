/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`token`]: opaque bearer token generation, parsing and hashing
/// - [`middleware`]: Axum middleware resolving bearer tokens to an [`AuthContext`](middleware::AuthContext)
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations, 4 lanes
/// - **Bearer Tokens**: 40 random base62 characters, stored as SHA-256
/// - **Constant-time Comparison**: token hashes are compared without early exit

pub mod middleware;
pub mod password;
pub mod token;
