//! Outbound product source: "fetch all products with aggregated review comments".

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use tokio::sync::RwLock;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error};

use crate::corpus::ProductRecord;
use crate::normalizer::ProductFields;

/// Backing store the recommender reads products from.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Every product with its review comments joined.
    async fn fetch_all(&self) -> Result<Vec<ProductRecord>>;

    /// One product, or `None` when the id is unknown.
    async fn fetch_one(&self, id: &str) -> Result<Option<ProductRecord>>;
}

/// In-process source, used by tests and offline tooling.
#[derive(Debug, Default, Clone)]
pub struct MemoryProductSource {
    products: Arc<RwLock<Vec<ProductRecord>>>,
}

impl MemoryProductSource {
    /// Source seeded with `products`.
    pub fn new(products: Vec<ProductRecord>) -> Self {
        Self {
            products: Arc::new(RwLock::new(products)),
        }
    }

    /// Inserts or replaces a product by id.
    pub async fn upsert(&self, product: ProductRecord) {
        let mut guard = self.products.write().await;
        match guard.iter_mut().find(|p| p.id == product.id) {
            Some(slot) => *slot = product,
            None => guard.push(product),
        }
    }
}

#[async_trait]
impl ProductSource for MemoryProductSource {
    async fn fetch_all(&self) -> Result<Vec<ProductRecord>> {
        Ok(self.products.read().await.clone())
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<ProductRecord>> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }
}

/// Where the category label of a product comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategorySource {
    /// Raw category foreign key on the product row.
    Id,
    /// Name of the joined category row.
    Name,
}

/// Table names the Postgres source reads.
#[derive(Debug, Clone)]
pub struct CatalogTables {
    /// Schema holding every table.
    pub schema: String,
    /// Products table.
    pub products: String,
    /// Reviews table.
    pub reviews: String,
    /// Categories table.
    pub categories: String,
}

impl CatalogTables {
    fn qualified(&self, table: &str) -> Result<String> {
        anyhow::ensure!(!self.schema.trim().is_empty(), "schema name is required");
        anyhow::ensure!(!table.trim().is_empty(), "table name is required");
        Ok(format!("{}.{}", quote_ident(&self.schema), quote_ident(table)))
    }
}

/// Postgres-backed source running one aggregated query per fetch.
pub struct PgProductSource {
    client: Client,
    select_all: String,
    select_one: String,
}

impl PgProductSource {
    /// Connects and prepares the aggregated product queries.
    pub async fn connect(
        database_url: &str,
        tables: &CatalogTables,
        category: CategorySource,
    ) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .context("failed to connect to Postgres")?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(error = %err, "postgres connection error");
            }
        });
        let base = select_sql(tables, category)?;
        let group = group_by(category);
        Ok(Self {
            client,
            select_all: format!("{base} {group} ORDER BY p.\"id\""),
            select_one: format!("{base} WHERE p.\"id\"::text = $1 {group}"),
        })
    }
}

#[async_trait]
impl ProductSource for PgProductSource {
    async fn fetch_all(&self) -> Result<Vec<ProductRecord>> {
        let rows = self
            .client
            .query(self.select_all.as_str(), &[])
            .await
            .context("failed to fetch products")?;
        debug!(rows = rows.len(), "fetched product corpus");
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<ProductRecord>> {
        let row = self
            .client
            .query_opt(self.select_one.as_str(), &[&id])
            .await
            .with_context(|| format!("failed to fetch product {id}"))?;
        Ok(row.as_ref().map(record_from_row))
    }
}

fn record_from_row(row: &Row) -> ProductRecord {
    let id: String = row.get("id");
    ProductRecord::from_fields(
        id,
        ProductFields {
            title: row.get("title"),
            description: row.get("description"),
            category: row.get("category"),
            comments: row.get::<_, Option<String>>("comments").unwrap_or_default(),
        },
    )
}

fn select_sql(tables: &CatalogTables, category: CategorySource) -> Result<String> {
    let products = tables.qualified(&tables.products)?;
    let reviews = tables.qualified(&tables.reviews)?;
    let (category_expr, category_join) = match category {
        CategorySource::Id => ("p.\"categoryId\"::text".to_string(), String::new()),
        CategorySource::Name => (
            "c.\"name\"".to_string(),
            format!(
                " LEFT JOIN {} c ON c.\"id\" = p.\"categoryId\"",
                tables.qualified(&tables.categories)?
            ),
        ),
    };
    Ok(format!(
        "SELECT \
            p.\"id\"::text AS id, \
            p.\"name\" AS title, \
            p.\"description\" AS description, \
            {category_expr} AS category, \
            string_agg(COALESCE(r.\"comment\", ''), ' ') AS comments \
        FROM {products} p \
        LEFT JOIN {reviews} r ON r.\"productId\" = p.\"id\"{category_join}"
    ))
}

fn group_by(category: CategorySource) -> &'static str {
    match category {
        CategorySource::Id => "GROUP BY p.\"id\"",
        CategorySource::Name => "GROUP BY p.\"id\", c.\"name\"",
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
pub fn quote_ident(input: &str) -> String {
    let escaped = input.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}
