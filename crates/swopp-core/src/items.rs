use tracing::{error, info};

use swopp_db::models::NewItem;
use swopp_db::queries;
use swopp_types::api::{CreateItemFields, ItemFields};
use swopp_types::lifecycle;
use swopp_types::models::{Item, RequestStatus};

use crate::guard::{self, Actor};
use crate::rows;
use crate::storage::ImageKind;
use crate::{Cleanup, ImageUpload, Result, Swopp, SwoppError};

fn non_negative(value: f64, field: &str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SwoppError::Validation(format!(
            "{} must be a non-negative number",
            field
        )))
    }
}

fn validate(fields: &ItemFields) -> Result<()> {
    let name = fields.name.trim();
    if name.is_empty() || name.chars().count() > 128 {
        return Err(SwoppError::validation("name must be 1 to 128 characters"));
    }
    non_negative(fields.price, "price")?;
    non_negative(fields.dimensions.width, "width")?;
    non_negative(fields.dimensions.height, "height")?;
    non_negative(fields.dimensions.depth, "depth")?;
    non_negative(fields.dimensions.weight, "weight")?;
    Ok(())
}

fn columns<'a>(fields: &'a ItemFields, image: Option<&'a str>) -> NewItem<'a> {
    NewItem {
        name: fields.name.trim(),
        item_type: fields.item_type.as_str(),
        description: fields.description.trim(),
        price: fields.price,
        image,
        width: fields.dimensions.width,
        height: fields.dimensions.height,
        depth: fields.dimensions.depth,
        weight: fields.dimensions.weight,
    }
}

/// Items may only change while their request is a draft.
fn require_draft(status: RequestStatus, action: &'static str) -> Result<()> {
    if status == RequestStatus::Draft {
        Ok(())
    } else {
        Err(SwoppError::InvalidState { status, action })
    }
}

impl Swopp {
    /// Add an item to a `Draft` request owned by `actor`.
    ///
    /// The first item promotes the request to `Pending` in the same
    /// transaction. The image, if any, is written before the transaction and
    /// removed again if the transaction fails.
    pub async fn create_item(
        &self,
        actor: &Actor,
        item: CreateItemFields,
        image: Option<ImageUpload>,
    ) -> Result<Item> {
        let request_id = item.request_id;
        let request = self
            .blocking(move |db| db.get_request(request_id)?.ok_or(SwoppError::NotFound("request")))
            .await?;
        guard::authorize(actor, &request)?;
        validate(&item.fields)?;

        let key = match &image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };

        let stored_key = key.clone();
        let fields = item.fields;
        let result = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    let row = queries::query_request(tx, request_id)?
                        .ok_or(SwoppError::NotFound("request"))?;
                    let status = rows::request_status(&row)?;
                    require_draft(status, "add items")?;

                    let before = queries::count_items(tx, request_id)?;
                    let id = queries::insert_item(tx, request_id, &columns(&fields, stored_key.as_deref()))?;
                    if let Some(next) = lifecycle::promotion_on_first_item(status, before) {
                        queries::set_request_status(
                            tx,
                            request_id,
                            status.as_str(),
                            next.as_str(),
                            row.driver_email.as_deref(),
                        )?;
                        info!("Request {} promoted {} -> {} by first item", request_id, status, next);
                    }
                    queries::query_item(tx, id)?.ok_or(SwoppError::NotFound("item"))
                })
            })
            .await;

        match result {
            Ok(row) => {
                info!("Item {} added to request {} by {}", row.id, request_id, actor.email);
                rows::item_from_row(row)
            }
            Err(e) => {
                self.discard_image(key.as_deref()).await;
                Err(e)
            }
        }
    }

    /// Replace an item's fields and, optionally, its image.
    ///
    /// The previous image is deleted only after the new one is stored and the
    /// row referencing it has committed.
    pub async fn update_item(
        &self,
        item_id: i64,
        actor: &Actor,
        fields: ItemFields,
        image: Option<ImageUpload>,
    ) -> Result<Item> {
        self.authorize_item(item_id, actor).await?;
        validate(&fields)?;

        let key = match &image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };

        let new_key = key.clone();
        let result = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    let current = queries::query_item(tx, item_id)?.ok_or(SwoppError::NotFound("item"))?;
                    let request = queries::query_request(tx, current.request_id)?
                        .ok_or(SwoppError::NotFound("request"))?;
                    require_draft(rows::request_status(&request)?, "edit items")?;

                    let image = new_key.as_deref().or(current.image.as_deref());
                    queries::update_item(tx, item_id, &columns(&fields, image))?;
                    let updated = queries::query_item(tx, item_id)?.ok_or(SwoppError::NotFound("item"))?;
                    let replaced = current.image.filter(|_| new_key.is_some());
                    Ok((updated, replaced))
                })
            })
            .await;

        match result {
            Ok((row, replaced)) => {
                info!("Item {} updated by {}", item_id, actor.email);
                Cleanup::remove(self.images.as_ref(), replaced).await;
                rows::item_from_row(row)
            }
            Err(e) => {
                self.discard_image(key.as_deref()).await;
                Err(e)
            }
        }
    }

    /// Delete an item of a `Draft` request, then its image.
    pub async fn delete_item(&self, item_id: i64, actor: &Actor) -> Result<Cleanup> {
        self.authorize_item(item_id, actor).await?;

        let image = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    let current = queries::query_item(tx, item_id)?.ok_or(SwoppError::NotFound("item"))?;
                    let request = queries::query_request(tx, current.request_id)?
                        .ok_or(SwoppError::NotFound("request"))?;
                    require_draft(rows::request_status(&request)?, "delete items")?;
                    queries::delete_item(tx, item_id)?;
                    Ok(current.image)
                })
            })
            .await?;

        info!("Item {} deleted by {}", item_id, actor.email);
        Ok(Cleanup::remove(self.images.as_ref(), image).await)
    }

    pub async fn get_item(&self, item_id: i64) -> Result<Item> {
        let row = self
            .blocking(move |db| db.get_item(item_id)?.ok_or(SwoppError::NotFound("item")))
            .await?;
        rows::item_from_row(row)
    }

    /// Items of one request in insertion order. Empty if there are none.
    pub async fn list_items_by_request(&self, request_id: i64) -> Result<Vec<Item>> {
        let found = self
            .blocking(move |db| Ok(db.list_items_by_request(request_id)?))
            .await?;
        rows::collect(found, rows::item_from_row)
    }

    /// Fetch a stored image and the content type implied by its key.
    pub async fn get_image(&self, key: &str) -> Result<(Vec<u8>, &'static str)> {
        let kind = ImageKind::from_key(key).ok_or(SwoppError::NotFound("image"))?;
        let bytes = self
            .images
            .get(key)
            .await
            .map_err(|e| {
                error!("Failed to read image {}: {}", key, e);
                SwoppError::Storage(e)
            })?
            .ok_or(SwoppError::NotFound("image"))?;
        Ok((bytes, kind.content_type()))
    }

    /// Existence and ownership of an item's parent request. Neither can change
    /// after creation, so this is checked outside the write transaction.
    async fn authorize_item(&self, item_id: i64, actor: &Actor) -> Result<()> {
        let request = self
            .blocking(move |db| {
                let item = db.get_item(item_id)?.ok_or(SwoppError::NotFound("item"))?;
                db.get_request(item.request_id)?
                    .ok_or(SwoppError::NotFound("request"))
            })
            .await?;
        guard::authorize(actor, &request)
    }
}
