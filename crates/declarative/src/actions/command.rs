//! Command action

use super::CauseResult;
use crate::context::ApplyContext;
use crate::types::{ApplyResult, CommandSpec};

pub(super) fn apply(spec: &CommandSpec, elevated: bool, ctx: &ApplyContext) -> CauseResult<ApplyResult> {
    log::info!("executing `{}`", spec.line);
    ctx.run_checked(spec, elevated)?;
    Ok(ApplyResult::Executed)
}
