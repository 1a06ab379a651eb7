pub mod password;

pub use password::{
    hash_password, Argon2PasswordHasher, Password, PasswordHashString, PasswordHasher,
};
