/// Declares a unit executor with the given declaration that replies with
/// its own name.
macro_rules! declared {
    ($name:ident, $declaration:expr) => {
        struct $name;

        impl $crate::commands::CommandExecutor for $name {
            fn execute(
                &self,
                ctx: &mut $crate::commands::CommandContext,
            ) -> $crate::commands::CommandResult<$crate::commands::Execution> {
                ctx.reply(stringify!($name));
                Ok($crate::commands::Execution::Success)
            }
        }

        impl $crate::commands::DeclaredCommand for $name {
            fn declaration() -> $crate::commands::CommandDeclaration {
                $declaration
            }

            fn construct(_: &$crate::services::ServiceCollection) -> anyhow::Result<Self> {
                Ok($name)
            }
        }
    };
}

pub(crate) use declared;
