/*!
 * Portfolio Content
 * Presentation rules for public content and the built-in fallback set
 */
pub mod about;
pub mod contact;
pub mod forms;
pub mod home;
pub mod mock;
pub mod skills;
