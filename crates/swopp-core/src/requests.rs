use chrono::Utc;
use tracing::info;

use swopp_db::models::{NewRequest, RequestRow};
use swopp_db::queries;
use swopp_types::api::{CreateRequestBody, UpdateRequestBody};
use swopp_types::lifecycle::{self, Authority, Precondition, Transition};
use swopp_types::models::{Request, RequestStatus};

use crate::guard::{self, Actor};
use crate::rows::{self, format_timestamp};
use crate::{Cleanup, Result, Swopp, SwoppError};

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SwoppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn clean_description(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

/// Check that `actor` may drive the edge `t` on `row`.
fn check_authority(actor: &Actor, row: &RequestRow, t: &Transition, driver: Option<&str>) -> Result<()> {
    if actor.is_admin() {
        return Ok(());
    }
    let allowed = match t.authority {
        Authority::Sender => guard::owns(actor, row),
        Authority::IncomingDriver => driver.is_some_and(|d| actor.is(d)),
        Authority::AssignedDriver => row.driver_email.as_deref().is_some_and(|d| actor.is(d)),
    };
    if allowed {
        Ok(())
    } else {
        Err(SwoppError::Forbidden("not allowed to change this request's status"))
    }
}

impl Swopp {
    /// Create a request in `Draft` with no items.
    pub async fn create_request(&self, actor: &Actor, body: CreateRequestBody) -> Result<Request> {
        let sender = body
            .sender_email
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| actor.email.clone());
        if !actor.is(&sender) && !actor.is_admin() {
            return Err(SwoppError::Forbidden("cannot create requests for another user"));
        }
        let pickup = required(&body.pickup, "pickup")?;
        let dropoff = required(&body.dropoff, "dropoff")?;
        let description = clean_description(body.description.as_deref());
        let scheduled_at = body.scheduled_at.map(format_timestamp);
        let alternate_date = body.alternate_date.map(format_timestamp);
        let created_at = format_timestamp(Utc::now());

        let row = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    if queries::query_user(tx, &sender)?.is_none() {
                        return Err(SwoppError::NotFound("sender"));
                    }
                    let id = queries::insert_request(
                        tx,
                        &NewRequest {
                            sender_email: &sender,
                            pickup: &pickup,
                            dropoff: &dropoff,
                            description: description.as_deref(),
                            scheduled_at: scheduled_at.as_deref(),
                            alternate_date: alternate_date.as_deref(),
                            created_at: &created_at,
                        },
                    )?;
                    queries::query_request(tx, id)?.ok_or(SwoppError::NotFound("request"))
                })
            })
            .await?;

        info!("Request {} created by {}", row.id, row.sender_email);
        rows::request_from_row(row)
    }

    pub async fn get_request(&self, id: i64) -> Result<Request> {
        let row = self
            .blocking(move |db| db.get_request(id)?.ok_or(SwoppError::NotFound("request")))
            .await?;
        rows::request_from_row(row)
    }

    /// Every request in the system. Admin only.
    pub async fn list_requests(&self, actor: &Actor) -> Result<Vec<Request>> {
        guard::require_admin(actor)?;
        let found = self.blocking(|db| Ok(db.list_requests()?)).await?;
        rows::collect(found, rows::request_from_row)
    }

    pub async fn list_sent_requests(&self, actor: &Actor) -> Result<Vec<Request>> {
        let email = actor.email.clone();
        let found = self
            .blocking(move |db| Ok(db.list_requests_by_sender(&email)?))
            .await?;
        rows::collect(found, rows::request_from_row)
    }

    pub async fn list_assigned_requests(&self, actor: &Actor) -> Result<Vec<Request>> {
        let email = actor.email.clone();
        let found = self
            .blocking(move |db| Ok(db.list_requests_by_driver(&email)?))
            .await?;
        rows::collect(found, rows::request_from_row)
    }

    /// Pending requests still waiting for a driver.
    pub async fn list_open_requests(&self) -> Result<Vec<Request>> {
        let found = self.blocking(|db| Ok(db.list_open_requests()?)).await?;
        rows::collect(found, rows::request_from_row)
    }

    /// Edit locations, dates or description of a `Draft` request.
    pub async fn update_request_fields(
        &self,
        id: i64,
        actor: &Actor,
        fields: UpdateRequestBody,
    ) -> Result<Request> {
        let actor = actor.clone();
        let row = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    let row = queries::query_request(tx, id)?.ok_or(SwoppError::NotFound("request"))?;
                    guard::authorize(&actor, &row)?;
                    if rows::request_status(&row)? != RequestStatus::Draft {
                        return Err(SwoppError::Forbidden("request can only be edited while draft"));
                    }

                    let pickup = match fields.pickup.as_deref() {
                        Some(p) => required(p, "pickup")?,
                        None => row.pickup.clone(),
                    };
                    let dropoff = match fields.dropoff.as_deref() {
                        Some(d) => required(d, "dropoff")?,
                        None => row.dropoff.clone(),
                    };
                    let description = match fields.description.as_deref() {
                        Some(d) => clean_description(Some(d)),
                        None => row.description.clone(),
                    };
                    let scheduled_at = fields
                        .scheduled_at
                        .map(format_timestamp)
                        .or_else(|| row.scheduled_at.clone());
                    let alternate_date = fields
                        .alternate_date
                        .map(format_timestamp)
                        .or_else(|| row.alternate_date.clone());

                    queries::update_request_fields(
                        tx,
                        id,
                        &pickup,
                        &dropoff,
                        description.as_deref(),
                        scheduled_at.as_deref(),
                        alternate_date.as_deref(),
                    )?;
                    queries::query_request(tx, id)?.ok_or(SwoppError::NotFound("request"))
                })
            })
            .await?;

        info!("Request {} updated by {}", id, row.sender_email);
        rows::request_from_row(row)
    }

    /// Move a request along one edge of the transition table.
    ///
    /// `driver` names the driver being assigned and is required for
    /// `Pending -> Accepted`; it is ignored otherwise.
    pub async fn transition_status(
        &self,
        id: i64,
        actor: &Actor,
        target: RequestStatus,
        driver: Option<String>,
    ) -> Result<Request> {
        let actor = actor.clone();
        let driver = driver.map(|d| d.trim().to_lowercase());
        let (from, row) = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    let row = queries::query_request(tx, id)?.ok_or(SwoppError::NotFound("request"))?;
                    let from = rows::request_status(&row)?;
                    let edge = lifecycle::transition(from, target)
                        .ok_or(SwoppError::InvalidTransition { from, to: target })?;
                    check_authority(&actor, &row, edge, driver.as_deref())?;

                    let mut new_driver = row.driver_email.clone();
                    match edge.precondition {
                        Precondition::Unconditional => {}
                        Precondition::HasItems => {
                            if queries::count_items(tx, id)? == 0 {
                                return Err(SwoppError::InvalidTransition { from, to: target });
                            }
                        }
                        Precondition::DriverUnassigned => {
                            if row.driver_email.is_some() {
                                return Err(SwoppError::InvalidTransition { from, to: target });
                            }
                            let email = driver
                                .clone()
                                .ok_or_else(|| SwoppError::validation("driverEmail is required"))?;
                            let user = queries::query_user(tx, &email)?
                                .ok_or(SwoppError::NotFound("driver"))?;
                            if !user.is_driver {
                                return Err(SwoppError::validation("user is not registered as a driver"));
                            }
                            if user.email == row.sender_email {
                                return Err(SwoppError::validation("sender cannot drive their own request"));
                            }
                            new_driver = Some(email);
                        }
                    }

                    let moved = queries::set_request_status(
                        tx,
                        id,
                        from.as_str(),
                        edge.to.as_str(),
                        new_driver.as_deref(),
                    )?;
                    if !moved {
                        return Err(SwoppError::Conflict("request status changed, retry".into()));
                    }
                    let row = queries::query_request(tx, id)?.ok_or(SwoppError::NotFound("request"))?;
                    Ok((from, row))
                })
            })
            .await?;

        info!("Request {} moved {} -> {}", id, from, row.status);
        rows::request_from_row(row)
    }

    /// Delete a request and its items, then remove their images.
    pub async fn delete_request(&self, id: i64, actor: &Actor) -> Result<Cleanup> {
        let by = actor.email.clone();
        let actor = actor.clone();
        let accepted_withdrawal = self.policy.accepted_withdrawal;
        let images = self
            .blocking(move |db| {
                db.with_tx(|tx| {
                    let row = queries::query_request(tx, id)?.ok_or(SwoppError::NotFound("request"))?;
                    let status = rows::request_status(&row)?;
                    if !actor.is_admin() {
                        guard::authorize(&actor, &row)?;
                        if status.is_terminal() {
                            return Err(SwoppError::InvalidState {
                                status,
                                action: "delete the request",
                            });
                        }
                        // driverless once the driver's account is removed
                        if status == RequestStatus::Accepted
                            && row.driver_email.is_some()
                            && !accepted_withdrawal
                        {
                            return Err(SwoppError::Forbidden(
                                "request was accepted by a driver and can no longer be withdrawn",
                            ));
                        }
                    }
                    let images = queries::item_images_for_request(tx, id)?;
                    queries::delete_request(tx, id)?;
                    Ok(images)
                })
            })
            .await?;

        info!("Request {} deleted by {}", id, by);
        Ok(Cleanup::remove(self.images.as_ref(), images).await)
    }
}
