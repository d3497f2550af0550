use commerce_core::Aggregate;

/// Decide and apply a command in place (no store, no bus).
///
/// Used by domain tests and by the unit of work, which decides against
/// in-memory copies before committing anything.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}
