pub(crate) mod coach;
pub(crate) mod health;
pub(crate) mod prices;
