//! Multi-aggregate decide-then-commit.
//!
//! A unit of work loads aggregates, runs commands against in-memory copies
//! and collects the resulting events per stream. Nothing touches the store
//! until [`UnitOfWork::commit`], which appends every stream in one atomic
//! batch guarded by the version each aggregate had when it was loaded. If any
//! command fails the unit is simply dropped.

use commerce_core::{AggregateId, AggregateRoot, ExpectedVersion};

use crate::aggregates::StreamedAggregate;
use crate::command_dispatcher::{DispatchError, load_aggregate, to_uncommitted};
use crate::event_store::{EventStore, StoredEvent, StreamAppend};

#[derive(Debug)]
struct PendingStream {
    aggregate_id: AggregateId,
    aggregate_type: &'static str,
    /// Version at load time.
    expected: u64,
    events: Vec<crate::event_store::UncommittedEvent>,
}

pub struct UnitOfWork<'s, S: ?Sized> {
    store: &'s S,
    pending: Vec<PendingStream>,
}

impl<'s, S> UnitOfWork<'s, S>
where
    S: EventStore + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            pending: Vec::new(),
        }
    }

    pub fn load<A: StreamedAggregate>(&self, aggregate_id: AggregateId) -> Result<A, DispatchError> {
        load_aggregate(self.store, aggregate_id)
    }

    /// Decide and apply `command` on `aggregate`, recording the events.
    ///
    /// The same aggregate may be executed several times; its events are
    /// appended to one stream guarded by the version it was loaded at.
    pub fn execute<A: StreamedAggregate>(
        &mut self,
        aggregate: &mut A,
        command: &A::Command,
    ) -> Result<Vec<A::Event>, DispatchError> {
        let before = aggregate.version();
        let events = commerce_events::execute(aggregate, command)?;
        if events.is_empty() {
            return Ok(events);
        }

        let aggregate_id = aggregate.stream_id();
        let uncommitted = to_uncommitted::<A>(aggregate_id, &events)?;
        match self.pending.iter_mut().find(|p| p.aggregate_id == aggregate_id) {
            Some(stream) => stream.events.extend(uncommitted),
            None => self.pending.push(PendingStream {
                aggregate_id,
                aggregate_type: A::AGGREGATE_TYPE,
                expected: before,
                events: uncommitted,
            }),
        }
        Ok(events)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn commit(self) -> Result<Vec<StoredEvent>, DispatchError> {
        if self.pending.is_empty() {
            return Ok(vec![]);
        }
        let batch = self
            .pending
            .into_iter()
            .map(|p| StreamAppend {
                aggregate_id: p.aggregate_id,
                aggregate_type: p.aggregate_type.to_string(),
                expected_version: ExpectedVersion::Exact(p.expected),
                events: p.events,
            })
            .collect();
        Ok(self.store.append_batch(batch)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use commerce_catalog::{
        ActivateProduct, AdjustStock, CreateProduct, MovementType, Product, ProductCommand,
        ProductId,
    };
    use commerce_core::DomainError;

    use super::*;
    use crate::event_store::InMemoryEventStore;

    fn seed_product(store: &InMemoryEventStore, stock: u32) -> ProductId {
        let id = ProductId::generate();
        let mut uow = UnitOfWork::new(store);
        let mut product: Product = uow.load(id.aggregate_id()).unwrap();
        let create = ProductCommand::CreateProduct(CreateProduct {
            product_id: id,
            sku: "SKU-1".into(),
            name: "Mug".into(),
            description: String::new(),
            category_id: None,
            price: commerce_core::Money::from_minor(1_000),
            initial_stock: stock,
            low_stock_threshold: 1,
            track_inventory: true,
            allow_backorder: false,
            occurred_at: Utc::now(),
        });
        uow.execute(&mut product, &create).unwrap();
        let activate = ProductCommand::ActivateProduct(ActivateProduct {
            product_id: id,
            occurred_at: Utc::now(),
        });
        uow.execute(&mut product, &activate).unwrap();
        uow.commit().unwrap();
        id
    }

    fn sell(id: ProductId, qty: i64) -> ProductCommand {
        ProductCommand::AdjustStock(AdjustStock {
            product_id: id,
            variant_id: None,
            movement: MovementType::Sale,
            delta: -qty,
            reference: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn repeated_executions_share_one_stream_append() {
        let store = InMemoryEventStore::new();
        let id = seed_product(&store, 5);

        let mut uow = UnitOfWork::new(&store);
        let mut product: Product = uow.load(id.aggregate_id()).unwrap();
        uow.execute(&mut product, &sell(id, 1)).unwrap();
        uow.execute(&mut product, &sell(id, 2)).unwrap();
        let committed = uow.commit().unwrap();

        assert_eq!(
            committed.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![3, 4]
        );
        let reloaded: Product = load_aggregate(&store, id.aggregate_id()).unwrap();
        assert_eq!(reloaded.stock_quantity(), 2);
    }

    #[test]
    fn concurrent_units_on_the_same_stream_conflict() {
        let store = InMemoryEventStore::new();
        let id = seed_product(&store, 1);

        let mut first = UnitOfWork::new(&store);
        let mut second = UnitOfWork::new(&store);
        let mut a: Product = first.load(id.aggregate_id()).unwrap();
        let mut b: Product = second.load(id.aggregate_id()).unwrap();
        first.execute(&mut a, &sell(id, 1)).unwrap();
        second.execute(&mut b, &sell(id, 1)).unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();

        assert!(matches!(err, DispatchError::Domain(DomainError::Conflict(_))));
        let reloaded: Product = load_aggregate(&store, id.aggregate_id()).unwrap();
        assert_eq!(reloaded.stock_quantity(), 0);
    }

    #[test]
    fn a_failed_command_leaves_nothing_pending() {
        let store = InMemoryEventStore::new();
        let id = seed_product(&store, 1);

        let mut uow = UnitOfWork::new(&store);
        let mut product: Product = uow.load(id.aggregate_id()).unwrap();
        let err = uow.execute(&mut product, &sell(id, 2)).unwrap_err();

        assert!(matches!(err, DispatchError::Domain(DomainError::OutOfStock(_))));
        assert!(uow.is_empty());
    }
}
