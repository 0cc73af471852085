pub mod gemini;
pub mod keyring;
pub mod memory;
pub mod store;
pub mod supabase;

pub use gemini::{Assist, GeminiAssist, GoalSuggestion, SlotSuggestion};
pub use memory::MemoryStore;
pub use store::{Identity, RemoteStore, StoreError};
pub use supabase::{SignUp, SupabaseClient};
