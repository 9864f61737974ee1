//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A small blog schema: two related models, a forward reference and an enum.
#[allow(dead_code)]
pub const BLOG_SCHEMA: &str = r#"generator client {
  provider = "prisma-client-js"
}

model User {
  id      Int      @id @default(autoincrement())
  email   String   @unique
  name    String?
  role    Role     @default(USER)
  profile Profile?
}

model Post {
  id        Int      @id @default(autoincrement())
  title     String
  author    User     @relation(fields: [authorId], references: [id])
  authorId  Int
}

model Profile {
  id     Int    @id
  bio    String?
  user   User   @relation(fields: [userId], references: [id])
  userId Int    @unique
}

enum Role {
  ADMIN
  USER
}
"#;

/// Writes `content` to `<temp_dir>/schema.prisma` and returns the path.
#[allow(dead_code)]
pub fn create_schema_file(temp_dir: &TempDir, content: &str) -> PathBuf {
    let path = temp_dir.path().join("schema.prisma");
    std::fs::write(&path, content).unwrap();
    path
}
