//! Item ledger on PostgreSQL

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult},
    models::{CreateItem, Item, ItemQuery, UpdateItem},
};

use super::{postgres::conflict_on_unique, postgres::PgLedgerTx, ItemLedger};

const ITEM_COLUMNS: &str =
    "id, code, title, author, category, stock, total_stock, publish_date, created_at";

#[async_trait]
impl ItemLedger for PgLedgerTx {
    async fn get_item(&mut self, item_id: i32) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn lock_item(&mut self, item_id: i32) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items WHERE id = $1 FOR UPDATE",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn get_stock(&mut self, item_id: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>("SELECT stock FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(AppError::ItemNotFound { item_id })
    }

    async fn decrement_stock(&mut self, item_id: i32) -> AppResult<i32> {
        let updated: Option<i32> = sqlx::query_scalar(
            "UPDATE items SET stock = stock - 1 WHERE id = $1 AND stock > 0 RETURNING stock",
        )
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(stock) = updated {
            return Ok(stock);
        }
        if self.exists(item_id).await? {
            Err(AppError::OutOfStock { item_id })
        } else {
            Err(AppError::ItemNotFound { item_id })
        }
    }

    async fn increment_stock(&mut self, item_id: i32) -> AppResult<i32> {
        let updated: Option<i32> = sqlx::query_scalar(
            "UPDATE items SET stock = stock + 1 WHERE id = $1 AND stock < total_stock RETURNING stock",
        )
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(stock) = updated {
            return Ok(stock);
        }
        if self.exists(item_id).await? {
            Err(AppError::Integrity(format!(
                "stock of item {} is already at its total",
                item_id
            )))
        } else {
            Err(AppError::ItemNotFound { item_id })
        }
    }

    async fn insert_item(&mut self, item: &CreateItem) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (code, title, author, category, stock, total_stock, publish_date)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(&item.code)
        .bind(&item.title)
        .bind(&item.author)
        .bind(&item.category)
        .bind(item.stock)
        .bind(item.publish_date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("Item code {} already exists", item.code)))
    }

    async fn update_item(&mut self, item_id: i32, update: &UpdateItem) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items SET
                code = COALESCE($2, code),
                title = COALESCE($3, title),
                author = COALESCE($4, author),
                category = COALESCE($5, category),
                publish_date = COALESCE($6, publish_date)
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(&update.code)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.category)
        .bind(update.publish_date)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| conflict_on_unique(e, || "Item code already exists".to_string()))?
        .ok_or(AppError::ItemNotFound { item_id })
    }

    async fn list_items(&mut self, query: &ItemQuery) -> AppResult<(Vec<Item>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE ($1::text IS NULL OR category = $1)",
        )
        .bind(&query.category)
        .fetch_one(&mut *self.tx)
        .await?;

        let items = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {} FROM items
            WHERE ($1::text IS NULL OR category = $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
            ITEM_COLUMNS
        ))
        .bind(&query.category)
        .bind(query.per_page())
        .bind(query.offset())
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((items, total))
    }

    async fn code_exists(&mut self, code: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM items WHERE code = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn delete_item(&mut self, item_id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
