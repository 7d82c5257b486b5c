// Session verbs: checkpoint, undo, redo

use crate::command::{Command, Session};
use crate::error::{EditError, EditResult};

pub fn op_checkpoint(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let name = cmd.require_arg(0, "checkpoint name")?;
    session.log.checkpoint(name);
    Ok(format!(
        "Checkpoint '{}' created (at event #{})",
        name,
        session.log.cursor()
    ))
}

pub fn op_undo(cmd: &Command, session: &mut Session) -> EditResult<String> {
    if let Some(name) = cmd.param_str("to") {
        let count = session.undo_to(name)?;
        if count == 0 {
            return Err(EditError::InvalidArgument("Nothing to undo".into()));
        }
        return Ok(format!("Undone {} event(s) to checkpoint '{}'", count, name));
    }

    let count = parse_count(cmd)?;
    let undone = session.undo(count)?;
    if undone == 0 {
        return Err(EditError::InvalidArgument("Nothing to undo".into()));
    }
    Ok(format!("Undone {} event(s)", undone))
}

pub fn op_redo(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let count = parse_count(cmd)?;
    let redone = session.redo(count)?;
    if redone == 0 {
        return Err(EditError::InvalidArgument("Nothing to redo".into()));
    }
    Ok(format!("Redone {} event(s)", redone))
}

fn parse_count(cmd: &Command) -> EditResult<usize> {
    match cmd.args.first() {
        None => Ok(1),
        Some(raw) => {
            let count: usize = raw
                .parse()
                .map_err(|_| EditError::InvalidArgument(format!("Invalid count: {}", raw)))?;
            if count == 0 {
                return Err(EditError::InvalidArgument("Count must be at least 1".into()));
            }
            Ok(count)
        }
    }
}
