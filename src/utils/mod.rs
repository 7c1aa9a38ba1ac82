pub mod time;

/// Random url-safe id.
pub fn longid() -> String {
    nanoid::nanoid!()
}
