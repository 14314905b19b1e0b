mod command_router;
mod launch;
mod voice_command;
