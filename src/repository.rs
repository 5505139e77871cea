//! A generic repository over one sea-orm entity.
//!
//! Services usually wrap a `Repository<E>` per table and add their own
//! queries next to the five basic ones:
//!
//! ```rust,ignore
//! let users: Repository<user::Entity> = Repository::new(db.clone());
//! let created = users.create(user::ActiveModel { name: Set("ada".into()), ..Default::default() }).await?;
//! let found = users.show(created.id).await?;
//! ```

use std::marker::PhantomData;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityName, EntityTrait, IntoActiveModel, Iterable,
    PrimaryKeyToColumn, PrimaryKeyTrait, QueryFilter, Value,
};

/// The primary key value of entity `E`.
pub type Id<E> = <<E as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType;

pub struct Repository<E> {
    db: DatabaseConnection,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), _entity: PhantomData }
    }
}

impl<E> Repository<E>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    Id<E>: Into<Value> + Clone,
{
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, _entity: PhantomData }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Every row of the table.
    pub async fn all(&self) -> Result<Vec<E::Model>, DbErr> {
        E::find().all(&self.db).await
    }

    /// Inserts `data` and returns the stored model.
    pub async fn create(&self, data: E::ActiveModel) -> Result<E::Model, DbErr> {
        data.insert(&self.db).await
    }

    /// Applies the set fields of `data` to the row with primary key `id`.
    /// Returns the number of affected rows.
    pub async fn update(&self, id: Id<E>, data: E::ActiveModel) -> Result<u64, DbErr> {
        let Some(key) = E::PrimaryKey::iter().next() else {
            return Err(DbErr::Custom(format!("{} has no primary key", E::default().table_name())));
        };

        let result = E::update_many()
            .set(data)
            .filter(key.into_column().eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Deletes the row with primary key `id`. Returns the number of
    /// affected rows.
    pub async fn delete(&self, id: Id<E>) -> Result<u64, DbErr> {
        let result = E::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected)
    }

    /// The row with primary key `id`, if any.
    pub async fn show(&self, id: Id<E>) -> Result<Option<E::Model>, DbErr> {
        E::find_by_id(id).one(&self.db).await
    }
}
