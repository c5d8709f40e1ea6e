pub(crate) mod bootstrap;
pub(crate) mod loop_runner;
mod script;

pub(crate) use script::ScriptedInterpreter;
