use async_trait::async_trait;
use chrono::NaiveDate;
use cuponera_catalog::Offer;
use cuponera_coupon::Coupon;
use cuponera_core::repository::{CouponRepository, IssueBatch, IssueError, IssuedBatch, RepoResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::offer_repo::{OfferRow, OFFER_COLUMNS};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    codigo: String,
    oferta_id: Uuid,
    cliente_id: String,
    estado: String,
    fecha_compra: NaiveDate,
    fecha_limite_uso: Option<NaiveDate>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = String;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(Coupon {
            id: row.id,
            code: row.codigo,
            offer_id: row.oferta_id,
            customer_id: row.cliente_id,
            state: row.estado.parse()?,
            purchase_date: row.fecha_compra,
            usage_deadline: row.fecha_limite_uso,
        })
    }
}

fn storage(err: sqlx::Error) -> IssueError {
    IssueError::Storage(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

pub struct PostgresCouponRepository {
    pool: PgPool,
}

impl PostgresCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CouponRepository for PostgresCouponRepository {
    async fn issue(&self, batch: IssueBatch) -> Result<IssuedBatch, IssueError> {
        // Any early return drops `tx`, which rolls it back.
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // 1. Lock the offer row; concurrent issuers queue here
        let row: Option<OfferRow> = sqlx::query_as(&format!(
            "SELECT {OFFER_COLUMNS} FROM ofertas WHERE id = $1 FOR UPDATE"
        ))
        .bind(batch.offer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let offer = row
            .ok_or(IssueError::OfferNotFound(batch.offer_id))
            .and_then(|r| Offer::try_from(r).map_err(IssueError::Storage))?;

        // 2. Re-check against the locked row
        batch.recheck(&offer)?;

        // 3. Insert coupons
        for coupon in &batch.coupons {
            let inserted = sqlx::query(
                r#"
                INSERT INTO cupones (id, codigo, oferta_id, cliente_id, estado, fecha_compra, fecha_limite_uso)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(coupon.id)
            .bind(&coupon.code)
            .bind(coupon.offer_id)
            .bind(&coupon.customer_id)
            .bind(coupon.state.as_str())
            .bind(coupon.purchase_date)
            .bind(coupon.usage_deadline)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                if is_unique_violation(&e) {
                    return Err(IssueError::DuplicateCode(coupon.code.clone()));
                }
                return Err(storage(e));
            }
        }

        // 4. Bump the counter
        let sold_count: i32 = sqlx::query_scalar(
            "UPDATE ofertas SET cupones_vendidos = cupones_vendidos + $2 WHERE id = $1 RETURNING cupones_vendidos",
        )
        .bind(batch.offer_id)
        .bind(batch.quantity() as i32)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        debug!("Committed {} coupons for offer {}", batch.quantity(), batch.offer_id);

        Ok(IssuedBatch {
            coupons: batch.coupons,
            sold_count: sold_count.max(0) as u32,
        })
    }

    async fn list_customer_coupons(&self, customer_id: &str) -> RepoResult<Vec<Coupon>> {
        let rows: Vec<CouponRow> = sqlx::query_as(
            r#"
            SELECT id, codigo, oferta_id, cliente_id, estado, fecha_compra, fecha_limite_uso
            FROM cupones
            WHERE cliente_id = $1
            ORDER BY fecha_compra DESC, codigo
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        let coupons = rows
            .into_iter()
            .map(Coupon::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(coupons)
    }

    async fn get_coupon(&self, id: Uuid) -> RepoResult<Option<Coupon>> {
        let row: Option<CouponRow> = sqlx::query_as(
            "SELECT id, codigo, oferta_id, cliente_id, estado, fecha_compra, fecha_limite_uso FROM cupones WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Coupon::try_from).transpose()?)
    }
}
