use async_trait::async_trait;
use chrono::NaiveDate;
use cuponera_catalog::{Business, Category, Offer};
use cuponera_core::repository::{OfferRepository, RepoResult};
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) const OFFER_COLUMNS: &str = "id, titulo, descripcion, empresa_id, rubro_id, \
    precio_regular::FLOAT8 AS precio_regular, precio_oferta::FLOAT8 AS precio_oferta, estado, \
    fecha_inicio, fecha_fin, cantidad_limite, cupones_vendidos, fecha_limite_uso";

#[derive(sqlx::FromRow)]
pub(crate) struct OfferRow {
    id: Uuid,
    titulo: String,
    descripcion: Option<String>,
    empresa_id: Uuid,
    rubro_id: Uuid,
    precio_regular: f64,
    precio_oferta: f64,
    estado: String,
    fecha_inicio: NaiveDate,
    fecha_fin: NaiveDate,
    cantidad_limite: Option<i32>,
    cupones_vendidos: i32,
    fecha_limite_uso: Option<NaiveDate>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = String;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        Ok(Offer {
            id: row.id,
            title: row.titulo,
            description: row.descripcion,
            business_id: row.empresa_id,
            category_id: row.rubro_id,
            regular_price: row.precio_regular,
            offer_price: row.precio_oferta,
            approval_state: row.estado.parse()?,
            start_date: row.fecha_inicio,
            end_date: row.fecha_fin,
            inventory_cap: row.cantidad_limite.map(|c| c.max(0) as u32),
            sold_count: row.cupones_vendidos.max(0) as u32,
            usage_deadline: row.fecha_limite_uso,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BusinessRow {
    id: Uuid,
    nombre: String,
    codigo: String,
    rubro_id: Option<Uuid>,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        Business {
            id: row.id,
            name: row.nombre,
            code: row.codigo,
            category_id: row.rubro_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    nombre: String,
}

pub struct PostgresOfferRepository {
    pool: PgPool,
}

impl PostgresOfferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OfferRepository for PostgresOfferRepository {
    async fn get_offer(&self, id: Uuid) -> RepoResult<Option<Offer>> {
        let row: Option<OfferRow> =
            sqlx::query_as(&format!("SELECT {OFFER_COLUMNS} FROM ofertas WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Offer::try_from).transpose()?)
    }

    async fn list_approved_offers(&self) -> RepoResult<Vec<Offer>> {
        let rows: Vec<OfferRow> = sqlx::query_as(&format!(
            "SELECT {OFFER_COLUMNS} FROM ofertas WHERE estado = 'aprobada' ORDER BY titulo, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let offers = rows
            .into_iter()
            .map(Offer::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(offers)
    }

    async fn get_business(&self, id: Uuid) -> RepoResult<Option<Business>> {
        let row: Option<BusinessRow> =
            sqlx::query_as("SELECT id, nombre, codigo, rubro_id FROM empresas WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Business::from))
    }

    async fn list_businesses(&self) -> RepoResult<Vec<Business>> {
        let rows: Vec<BusinessRow> =
            sqlx::query_as("SELECT id, nombre, codigo, rubro_id FROM empresas ORDER BY nombre")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Business::from).collect())
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as("SELECT id, nombre FROM rubros WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Category { id: r.id, name: r.nombre }))
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as("SELECT id, nombre FROM rubros ORDER BY nombre")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Category { id: r.id, name: r.nombre })
            .collect())
    }
}
