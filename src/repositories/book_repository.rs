use crate::error::{RepoResult, RepositoryError};
use crate::models::{Book, BookDetails, BookFilter};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const BOOK_COLUMNS: &str = "b.id, b.owner_id, b.title, b.author, b.genre, b.isbn, b.description, \
                            b.image_url, b.condition, b.daily_fee, b.selling_price, b.is_available, \
                            b.created_at";

/// Repository for book listings and their society tags
pub struct BookRepository {
    pool: PgPool,
}

impl BookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_in(
        &self,
        conn: &mut PgConnection,
        owner_id: Uuid,
        details: &BookDetails,
    ) -> RepoResult<Book> {
        let sql = format!(
            r#"
            INSERT INTO books AS b
                (owner_id, title, author, genre, isbn, description, image_url, condition, daily_fee, selling_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {BOOK_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Book>(&sql)
            .bind(owner_id)
            .bind(&details.title)
            .bind(&details.author)
            .bind(&details.genre)
            .bind(&details.isbn)
            .bind(&details.description)
            .bind(&details.image_url)
            .bind(details.condition.as_str())
            .bind(details.daily_fee)
            .bind(details.selling_price)
            .fetch_one(&mut *conn)
            .await?)
    }

    /// Tag a book into a society. Returns false when the tag already existed.
    pub async fn tag_in(
        &self,
        conn: &mut PgConnection,
        book_id: Uuid,
        society_id: Uuid,
    ) -> RepoResult<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO book_societies (book_id, society_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(book_id)
        .bind(society_id)
        .execute(&mut *conn)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            sqlx::query("UPDATE societies SET book_count = book_count + 1 WHERE id = $1")
                .bind(society_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(inserted)
    }

    pub async fn tag(&self, book_id: Uuid, society_id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        let inserted = self.tag_in(&mut tx, book_id, society_id).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    /// Remove one society tag. Returns false when the book was not tagged there.
    pub async fn untag(&self, book_id: Uuid, society_id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query(
            "DELETE FROM book_societies WHERE book_id = $1 AND society_id = $2",
        )
        .bind(book_id)
        .bind(society_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if removed {
            sqlx::query(
                "UPDATE societies SET book_count = GREATEST(book_count - 1, 0) WHERE id = $1",
            )
            .bind(society_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    /// Drop every society tag on a book, decrementing each society's count
    pub async fn untag_all_in(&self, conn: &mut PgConnection, book_id: Uuid) -> RepoResult<u64> {
        let removed: Vec<(Uuid,)> = sqlx::query_as(
            "DELETE FROM book_societies WHERE book_id = $1 RETURNING society_id",
        )
        .bind(book_id)
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<Uuid> = removed.into_iter().map(|(id,)| id).collect();
        if !ids.is_empty() {
            sqlx::query(
                "UPDATE societies SET book_count = GREATEST(book_count - 1, 0) WHERE id = ANY($1)",
            )
            .bind(&ids)
            .execute(&mut *conn)
            .await?;
        }
        Ok(ids.len() as u64)
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = $1");
        Ok(sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn update(&self, id: Uuid, details: &BookDetails) -> RepoResult<Book> {
        let sql = format!(
            r#"
            UPDATE books AS b
            SET title = $2, author = $3, genre = $4, isbn = $5, description = $6,
                image_url = $7, condition = $8, daily_fee = $9, selling_price = $10
            WHERE b.id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .bind(&details.title)
            .bind(&details.author)
            .bind(&details.genre)
            .bind(&details.isbn)
            .bind(&details.description)
            .bind(&details.image_url)
            .bind(details.condition.as_str())
            .bind(details.daily_fee)
            .bind(details.selling_price)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Book {} not found", id)))
    }

    /// Delete a book with no rental or sale history
    pub async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        self.untag_all_in(&mut tx, id).await?;
        let rows = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(rows > 0)
    }

    /// Books tagged into a society, newest first
    pub async fn list_for_society(
        &self,
        society_id: Uuid,
        filter: &BookFilter,
    ) -> RepoResult<Vec<Book>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {BOOK_COLUMNS} FROM books b \
             JOIN book_societies bs ON bs.book_id = b.id \
             WHERE bs.society_id = "
        ));
        qb.push_bind(society_id);

        if let Some(pattern) = filter.search_pattern() {
            qb.push(" AND (b.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.author ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(genre) = filter.genre.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            qb.push(" AND LOWER(b.genre) = LOWER(").push_bind(genre.to_string()).push(")");
        }
        if filter.available_only {
            qb.push(" AND b.is_available");
        }
        qb.push(" ORDER BY b.created_at DESC");

        Ok(qb.build_query_as::<Book>().fetch_all(&self.pool).await?)
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Book>> {
        let sql = format!(
            "SELECT {BOOK_COLUMNS} FROM books b WHERE b.owner_id = $1 ORDER BY b.created_at DESC"
        );
        Ok(sqlx::query_as::<_, Book>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn is_tagged(&self, book_id: Uuid, society_id: Uuid) -> RepoResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM book_societies WHERE book_id = $1 AND society_id = $2",
        )
        .bind(book_id)
        .bind(society_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn society_ids(&self, book_id: Uuid) -> RepoResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT society_id FROM book_societies WHERE book_id = $1")
                .bind(book_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Atomically take an available book off the shelf.
    /// Fails with `StaleState` if another rental or sale got there first.
    pub async fn claim_in(&self, conn: &mut PgConnection, book_id: Uuid) -> RepoResult<Book> {
        let sql = format!(
            r#"
            UPDATE books AS b SET is_available = FALSE
            WHERE b.id = $1 AND b.is_available
            RETURNING {BOOK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Book>(&sql)
            .bind(book_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RepositoryError::StaleState("Book is not available".to_string()))
    }

    pub async fn release_in(&self, conn: &mut PgConnection, book_id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE books SET is_available = TRUE WHERE id = $1")
            .bind(book_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Hand a sold book to its buyer. It stays off every shelf until relisted.
    pub async fn transfer_in(
        &self,
        conn: &mut PgConnection,
        book_id: Uuid,
        new_owner: Uuid,
    ) -> RepoResult<()> {
        self.untag_all_in(conn, book_id).await?;
        sqlx::query(
            "UPDATE books SET owner_id = $2, is_available = FALSE, selling_price = NULL WHERE id = $1",
        )
        .bind(book_id)
        .bind(new_owner)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Lock a book row for the rest of the transaction. Waits out any in-flight claim.
    pub async fn lock_in(&self, conn: &mut PgConnection, book_id: Uuid) -> RepoResult<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = $1 FOR UPDATE");
        sqlx::query_as::<_, Book>(&sql)
            .bind(book_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Book {} not found", book_id)))
    }

    /// Toggle availability of a book with no open rental.
    /// Fails with `StaleState` if a rental holds the book.
    pub async fn set_available_in(
        &self,
        conn: &mut PgConnection,
        book_id: Uuid,
        available: bool,
    ) -> RepoResult<Book> {
        let sql = format!(
            r#"
            UPDATE books AS b SET is_available = $2
            WHERE b.id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM book_rentals r
                  WHERE r.book_id = $1 AND r.status <> 'returned'
              )
            RETURNING {BOOK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Book>(&sql)
            .bind(book_id)
            .bind(available)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                RepositoryError::StaleState(
                    "Availability cannot change while the book is rented".to_string(),
                )
            })
    }

    /// Whether `user_id` is an active member of a society the book is listed in
    pub async fn is_visible_to(&self, book_id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let (visible,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM book_societies bs
                JOIN society_members m ON m.society_id = bs.society_id
                WHERE bs.book_id = $1 AND m.user_id = $2 AND m.is_active
            )
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(visible)
    }
}
