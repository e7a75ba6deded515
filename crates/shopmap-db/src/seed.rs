use sqlx::PgPool;

use crate::DbError;

const DEFAULT_COLORS: &[(&str, &str)] = &[
    ("Black", "#000000"),
    ("White", "#FFFFFF"),
    ("Red", "#FF0000"),
    ("Green", "#008000"),
    ("Blue", "#0000FF"),
    ("Grey", "#808080"),
    ("Navy", "#000080"),
    ("Beige", "#F5F5DC"),
];

const DEFAULT_SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL"];

const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Clothing", "Apparel for all ages"),
    ("Shoes", "Footwear"),
    ("Accessories", "Bags, belts, jewellery and more"),
    ("Electronics", "Devices and gadgets"),
    ("Home & Kitchen", "Household goods"),
];

/// Number of rows each seed step inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub colors: u64,
    pub sizes: u64,
    pub categories: u64,
}

/// Insert the default colors, sizes and top-level categories.
///
/// Rows that already exist (matched by name) are left untouched, so running
/// the seed twice inserts nothing the second time. All inserts run inside a
/// single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_defaults(pool: &PgPool) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for (name, code) in DEFAULT_COLORS {
        let result = sqlx::query(
            "INSERT INTO colors (name, code) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(code)
        .execute(&mut *tx)
        .await?;
        summary.colors += result.rows_affected();
    }

    for name in DEFAULT_SIZES {
        let result = sqlx::query("INSERT INTO sizes (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        summary.sizes += result.rows_affected();
    }

    for (name, description) in DEFAULT_CATEGORIES {
        // categories.name is not unique, so idempotency is checked explicitly.
        let result = sqlx::query(
            "INSERT INTO categories (name, description) \
             SELECT $1, $2 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM categories WHERE name = $1 AND parent_id IS NULL \
             )",
        )
        .bind(name)
        .bind(description)
        .execute(&mut *tx)
        .await?;
        summary.categories += result.rows_affected();
    }

    tx.commit().await?;
    Ok(summary)
}
