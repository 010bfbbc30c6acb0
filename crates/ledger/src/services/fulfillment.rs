//! FIFO fulfillment: consume a variant's lots oldest-first and cost the sale.
//!
//! # Ordering
//!
//! Lots are consumed in ascending order of:
//! 1. the arrival date of the lot's originating purchase order, with a
//!    missing date placed according to [`UnknownArrivalPolicy`]
//! 2. the lot's creation timestamp
//! 3. the lot id
//!
//! # Costing
//!
//! A consumed unit costs the lot's stored USD cost, else its source cost
//! converted through the originating order's rate. A lot with neither is a
//! costing gap: its units count as zero and the gap is logged and returned,
//! but the sale goes through.
//!
//! COGS is accumulated unrounded and rounded once, when persisted.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use stockroom_core::{
    Actor, CustomerOrderItemId, InventoryLotId, StockChangeReason, VariantId, round_currency,
};

use super::audit::StockAuditLog;
use crate::clock::Clock;
use crate::db::{
    CustomerOrderStore, LedgerStore, LedgerTx, LotStore, RepositoryError, VariantStore,
};
use crate::error::LedgerError;
use crate::models::{CustomerOrderItem, LotWithOrigin, NewStockChange, OrderRef};

/// Where lots whose purchase order has no arrival date sort.
///
/// Manual lots and lots restocked by a void have no purchase order at all,
/// so they count as having no arrival date. Under the default `Epoch` policy
/// a restocked lot is therefore sold before older purchase-order stock. Use
/// `LotCreated` to sell restocked units as the newest stock instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownArrivalPolicy {
    /// Treat the date as the Unix epoch: such lots are consumed first.
    #[default]
    Epoch,
    /// Use the lot's own creation timestamp.
    LotCreated,
    /// Consume such lots after every lot with a known arrival date.
    Last,
}

impl UnknownArrivalPolicy {
    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epoch => "epoch",
            Self::LotCreated => "lot-created",
            Self::Last => "last",
        }
    }
}

impl fmt::Display for UnknownArrivalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnknownArrivalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "epoch" => Ok(Self::Epoch),
            "lot-created" => Ok(Self::LotCreated),
            "last" => Ok(Self::Last),
            other => Err(format!(
                "unknown arrival policy {other:?}, expected epoch, lot-created or last"
            )),
        }
    }
}

/// Sort key of a lot: (unknown-last bucket, arrival, created, id).
type FifoKey = (bool, DateTime<Utc>, DateTime<Utc>, InventoryLotId);

fn fifo_key(lot: &LotWithOrigin, policy: UnknownArrivalPolicy) -> FifoKey {
    let created_at = lot.lot.created_at;
    let (unknown_last, arrival) = match (lot.order_arrival_date, policy) {
        (Some(arrival), _) => (false, arrival),
        (None, UnknownArrivalPolicy::Epoch) => (false, DateTime::<Utc>::UNIX_EPOCH),
        (None, UnknownArrivalPolicy::LotCreated) => (false, created_at),
        (None, UnknownArrivalPolicy::Last) => (true, created_at),
    };
    (unknown_last, arrival, created_at, lot.lot.id)
}

/// Put lots into consumption order.
pub fn sort_fifo(lots: &mut [LotWithOrigin], policy: UnknownArrivalPolicy) {
    lots.sort_by_key(|lot| fifo_key(lot, policy));
}

/// USD unit cost of a lot, unrounded, if it can be resolved.
#[must_use]
pub fn lot_unit_cost_usd(lot: &LotWithOrigin) -> Option<Decimal> {
    lot.lot.cost_usd.or_else(|| {
        lot.lot
            .cost_source
            .zip(lot.order_exchange_rate)
            .map(|(source, rate)| rate.to_usd(source))
    })
}

/// Units taken from one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotDraw {
    pub lot_id: InventoryLotId,
    pub quantity: i32,
    /// `None` for a costing gap.
    pub unit_cost_usd: Option<Decimal>,
}

/// A lot consumed without any resolvable USD cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostingGap {
    pub lot_id: InventoryLotId,
    pub quantity: i32,
}

/// What a FIFO consumption took and what it cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consumption {
    /// Total USD cost, unrounded.
    pub cogs_usd: Decimal,
    pub draws: Vec<LotDraw>,
    pub costing_gaps: Vec<CostingGap>,
}

impl Consumption {
    /// Plan the draws for `quantity` units from lots already in FIFO order.
    ///
    /// Returns `None` if the lots hold fewer than `quantity` units.
    #[must_use]
    pub fn plan(lots: &[LotWithOrigin], quantity: i32) -> Option<Self> {
        let mut needed = quantity;
        let mut cogs_usd = Decimal::ZERO;
        let mut draws = Vec::new();
        let mut costing_gaps = Vec::new();

        for lot in lots {
            if needed == 0 {
                break;
            }
            let take = needed.min(lot.lot.remaining_quantity);
            if take <= 0 {
                continue;
            }

            let unit_cost_usd = lot_unit_cost_usd(lot);
            match unit_cost_usd {
                Some(cost) => cogs_usd += cost * Decimal::from(take),
                None => costing_gaps.push(CostingGap {
                    lot_id: lot.lot.id,
                    quantity: take,
                }),
            }
            draws.push(LotDraw {
                lot_id: lot.lot.id,
                quantity: take,
                unit_cost_usd,
            });
            needed -= take;
        }

        (needed == 0).then_some(Self {
            cogs_usd,
            draws,
            costing_gaps,
        })
    }
}

/// Result of fulfilling one customer order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfillmentOutcome {
    /// The line with its COGS recorded.
    pub item: CustomerOrderItem,
    /// Persisted COGS, rounded to cents.
    pub cogs_usd: Decimal,
    pub costing_gaps: Vec<CostingGap>,
}

/// Consumes lots in FIFO order.
#[derive(Clone)]
pub struct FulfillmentEngine<S> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: UnknownArrivalPolicy,
    audit: StockAuditLog<S>,
}

impl<S: LedgerStore> FulfillmentEngine<S> {
    /// Create an engine over `store`.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, policy: UnknownArrivalPolicy) -> Self {
        Self {
            audit: StockAuditLog::new(store.clone()),
            store,
            clock,
            policy,
        }
    }

    /// The ordering applied to lots without an arrival date.
    #[must_use]
    pub const fn policy(&self) -> UnknownArrivalPolicy {
        self.policy
    }

    /// Fulfill `quantity` units of a variant for a customer order line in
    /// its own transaction.
    ///
    /// # Errors
    ///
    /// - `Validation` if `quantity` is not positive
    /// - `InsufficientStock` if the lots hold fewer units; nothing changes
    /// - `NotFound` if the variant or order line does not exist
    #[instrument(
        skip_all,
        fields(variant_id = %variant_id, quantity = quantity, item_id = %customer_order_item_id)
    )]
    pub async fn fulfill(
        &self,
        variant_id: VariantId,
        quantity: i32,
        customer_order_item_id: CustomerOrderItemId,
    ) -> Result<FulfillmentOutcome, LedgerError> {
        let mut tx = self.store.begin().await?;
        let outcome = self
            .fulfill_in(&mut tx, variant_id, quantity, customer_order_item_id)
            .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// [`Self::fulfill`] inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::fulfill`]. The caller must drop or roll back `tx` on error.
    pub async fn fulfill_in(
        &self,
        tx: &mut S::Tx,
        variant_id: VariantId,
        quantity: i32,
        customer_order_item_id: CustomerOrderItemId,
    ) -> Result<FulfillmentOutcome, LedgerError> {
        let consumption = self.consume_fifo(tx, variant_id, quantity).await?;
        let cogs_usd = round_currency(consumption.cogs_usd);

        let item = tx
            .set_customer_order_item_cogs(customer_order_item_id, cogs_usd)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    LedgerError::not_found("customer order item", customer_order_item_id)
                }
                other => other.into(),
            })?;

        info!(
            variant_id = %variant_id,
            quantity,
            cogs_usd = %cogs_usd,
            lots = consumption.draws.len(),
            "Fulfilled order line"
        );

        Ok(FulfillmentOutcome {
            item,
            cogs_usd,
            costing_gaps: consumption.costing_gaps,
        })
    }

    /// Remove `quantity` units of a variant from stock without a sale,
    /// recording a manual audit entry.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fulfill`], minus the order line.
    #[instrument(skip_all, fields(variant_id = %variant_id, quantity = quantity, actor = %actor))]
    pub async fn write_off(
        &self,
        variant_id: VariantId,
        quantity: i32,
        actor: &Actor,
    ) -> Result<Consumption, LedgerError> {
        let mut tx = self.store.begin().await?;
        let consumption = self.consume_fifo(&mut tx, variant_id, quantity).await?;
        self.audit
            .record_in(
                &mut tx,
                &NewStockChange {
                    variant_id,
                    change: -quantity,
                    change_time: self.clock.now(),
                    reason: StockChangeReason::Manual,
                    actor: actor.clone(),
                    order: OrderRef::Manual,
                },
            )
            .await?;
        tx.commit().await?;

        info!(variant_id = %variant_id, quantity, "Wrote off stock");
        Ok(consumption)
    }

    /// Lock, sort and consume lots for `quantity` units.
    async fn consume_fifo(
        &self,
        tx: &mut S::Tx,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<Consumption, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::Validation(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        let mut lots = tx.lock_available_lots(variant_id).await?;
        sort_fifo(&mut lots, self.policy);

        let Some(consumption) = Consumption::plan(&lots, quantity) else {
            let available: i64 = lots
                .iter()
                .map(|lot| i64::from(lot.lot.remaining_quantity))
                .sum();
            let variant = tx
                .get_variant(variant_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("variant", variant_id))?;
            return Err(LedgerError::InsufficientStock {
                variant: variant.label(),
                available,
                requested: quantity,
            });
        };

        for draw in &consumption.draws {
            tx.consume_from_lot(draw.lot_id, draw.quantity).await?;
        }
        for gap in &consumption.costing_gaps {
            warn!(
                variant_id = %variant_id,
                lot_id = %gap.lot_id,
                quantity = gap.quantity,
                "Lot has no resolvable USD cost, counting it as zero"
            );
        }

        Ok(consumption)
    }
}
