mod group;
mod item;

pub use self::group::Group;
pub use self::item::Item;
pub(crate) use self::item::ItemRow;
