use state_machines::state_machine;

state_machine! {
    name: EvaluationMachine,
    state: EvaluationState,
    initial: Ready,
    states: [Ready, DatasetLoaded, UnitsDispatched, Scored, Summarized, Completed, Failed],
    events {
        load_dataset { transition: { from: Ready, to: DatasetLoaded } }
        dispatch_units { transition: { from: DatasetLoaded, to: UnitsDispatched } }
        score { transition: { from: UnitsDispatched, to: Scored } }
        summarize { transition: { from: Scored, to: Summarized } }
        finalize { transition: { from: Summarized, to: Completed } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: DatasetLoaded, to: Failed }
            transition: { from: UnitsDispatched, to: Failed }
            transition: { from: Scored, to: Failed }
            transition: { from: Summarized, to: Failed }
        }
    }
}

pub fn ready() -> EvaluationMachine<(), Ready> {
    EvaluationMachine::new(())
}
