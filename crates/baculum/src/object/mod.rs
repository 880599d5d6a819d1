pub mod manager;

pub use manager::{
    ObjectList, ObjectManager, ObjectMode, ObjectQuery, ObjectTypeOverview, ObjectsOverview,
    FILES_TYPE,
};
