//! Command-line surface.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use carryover_shared::types::{AccountBookId, FamilyMemberId, UserId};

#[derive(Parser, Debug)]
#[command(
    name = "budgetctl",
    version,
    about = "Budget period repair, diagnostics and sweeps",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backfill attribution and reconcile rollover chains (dry run unless --execute).
    Repair(RepairArgs),

    /// Diagnostic dry run: unresolved records, drifted and failed scopes.
    Status {
        /// Account book to inspect.
        #[arg(long = "account-book", value_name = "ID")]
        account_book: AccountBookId,
    },

    /// Figures for the period containing a date.
    BudgetStatus(BudgetStatusArgs),

    /// Rollover history of an owner's chain, oldest period first.
    History(HistoryArgs),

    /// Restore the attribution a repair run overwrote (dry run unless --execute).
    Rollback(RollbackArgs),

    /// Extend and reconcile every scope of every account book.
    Sweep {
        /// Run a single pass and exit.
        #[arg(long)]
        once: bool,
    },
}

#[derive(Args, Debug)]
pub struct RepairArgs {
    /// Account book to repair.
    #[arg(long = "account-book", value_name = "ID", required_unless_present = "all", conflicts_with = "all")]
    pub account_book: Option<AccountBookId>,

    /// Repair every account book.
    #[arg(long)]
    pub all: bool,

    /// Write changes; without it nothing is modified.
    #[arg(long)]
    pub execute: bool,

    /// Records per batch (defaults to `repair.batch_size`).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// Ignore a stored cursor and start from the beginning.
    #[arg(long)]
    pub no_resume: bool,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("owner").required(true).args(["user", "member"])))]
pub struct BudgetStatusArgs {
    /// Account book of the budget.
    #[arg(long = "account-book", value_name = "ID")]
    pub account_book: AccountBookId,

    /// Owner through the user path.
    #[arg(long, value_name = "ID")]
    pub user: Option<UserId>,

    /// Owner through the family-member path.
    #[arg(long, value_name = "ID")]
    pub member: Option<FamilyMemberId>,

    /// Reference date (defaults to today in `engine.timezone`).
    #[arg(long = "as-of", value_name = "DATE")]
    pub as_of: Option<NaiveDate>,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("owner").required(true).args(["user", "member"])))]
pub struct HistoryArgs {
    /// Account book of the budget.
    #[arg(long = "account-book", value_name = "ID")]
    pub account_book: AccountBookId,

    /// Owner through the user path.
    #[arg(long, value_name = "ID")]
    pub user: Option<UserId>,

    /// Owner through the family-member path.
    #[arg(long, value_name = "ID")]
    pub member: Option<FamilyMemberId>,
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Run id printed in the repair report.
    #[arg(long = "run", value_name = "UUID")]
    pub run_id: Uuid,

    /// Write changes; without it nothing is modified.
    #[arg(long)]
    pub execute: bool,

    /// Changes per batch (defaults to `repair.batch_size`).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repair_defaults_to_dry_run() {
        let id = AccountBookId::new();
        let cli = Cli::try_parse_from(["budgetctl", "repair", "--account-book", &id.to_string()]).unwrap();
        let Command::Repair(args) = cli.command else {
            panic!("expected repair");
        };
        assert_eq!(args.account_book, Some(id));
        assert!(!args.execute);
        assert!(!args.no_resume);
    }

    #[test]
    fn test_repair_needs_a_target() {
        assert!(Cli::try_parse_from(["budgetctl", "repair"]).is_err());
        assert!(Cli::try_parse_from(["budgetctl", "repair", "--all", "--execute"]).is_ok());
    }

    #[test]
    fn test_budget_status_needs_exactly_one_owner() {
        let book = AccountBookId::new().to_string();
        let user = UserId::new().to_string();
        let member = FamilyMemberId::new().to_string();

        assert!(Cli::try_parse_from(["budgetctl", "budget-status", "--account-book", &book]).is_err());
        assert!(
            Cli::try_parse_from([
                "budgetctl", "budget-status", "--account-book", &book, "--user", &user, "--member", &member,
            ])
            .is_err()
        );

        let cli = Cli::try_parse_from([
            "budgetctl", "budget-status", "--account-book", &book, "--member", &member, "--as-of", "2024-03-15",
        ])
        .unwrap();
        let Command::BudgetStatus(args) = cli.command else {
            panic!("expected budget-status");
        };
        assert_eq!(args.as_of, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn test_rollback_defaults_to_dry_run() {
        let run = Uuid::now_v7();
        let cli = Cli::try_parse_from(["budgetctl", "rollback", "--run", &run.to_string()]).unwrap();
        let Command::Rollback(args) = cli.command else {
            panic!("expected rollback");
        };
        assert_eq!(args.run_id, run);
        assert!(!args.execute);

        assert!(Cli::try_parse_from(["budgetctl", "rollback"]).is_err());
        assert!(Cli::try_parse_from(["budgetctl", "rollback", "--run", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_history_needs_exactly_one_owner() {
        let book = AccountBookId::new().to_string();
        let user = UserId::new().to_string();

        assert!(Cli::try_parse_from(["budgetctl", "history", "--account-book", &book]).is_err());
        let cli = Cli::try_parse_from(["budgetctl", "history", "--account-book", &book, "--user", &user]).unwrap();
        let Command::History(args) = cli.command else {
            panic!("expected history");
        };
        assert_eq!(args.user.map(|u| u.to_string()), Some(user));
        assert_eq!(args.member, None);
    }
}
