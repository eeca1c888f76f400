use crate::reports;
use clap::{Args, Subcommand};
use signforge::config::Config;
use signforge::error::SfResult;
use signforge::registry::{ModelSort, SortOrder};

#[derive(Args, Debug, Clone)]
pub struct ModelsArgs {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub action: ModelsAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ModelsAction {
    List {
        #[arg(long, value_enum, default_value_t = ModelSort::Timestamp)]
        sort: ModelSort,
        #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
        order: SortOrder,
    },
    Rename {
        old: String,
        new: String,
    },
    Delete {
        name: String,
    },
    /// Delete every saved model.
    Clear,
}

pub fn run(args: ModelsArgs, config: Config) -> SfResult<()> {
    let state = super::open_state(config)?;
    match args.action {
        ModelsAction::List { sort, order } => {
            let models = state.registry.list(sort, order)?;
            reports::print_model_list(&models);
        }
        ModelsAction::Rename { old, new } => {
            state.registry.rename(&old, &new)?;
            println!("✏️  Renamed '{}' -> '{}'", old, new);
        }
        ModelsAction::Delete { name } => {
            state.registry.delete(&name)?;
            println!("🗑️  Deleted '{}'", name);
        }
        ModelsAction::Clear => {
            let removed = state.registry.clear()?;
            println!("🧹 Removed {} models", removed);
        }
    }
    Ok(())
}
