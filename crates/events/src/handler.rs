/// Decide and evolve in one step, without persistence.
///
/// Calls `handle` and then `apply`s every produced event to the aggregate.
/// Domain unit tests use this to walk an aggregate through its lifecycle;
/// production paths go through the infrastructure dispatcher instead.
pub fn execute<A>(
    aggregate: &mut A,
    command: &A::Command,
) -> Result<Vec<A::Event>, A::Error>
where
    A: partsupply_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
