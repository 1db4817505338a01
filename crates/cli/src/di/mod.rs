mod pools;

pub use pools::ClientPools;
