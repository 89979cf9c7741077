mod helpers;
mod mocks;
mod orders;
mod tracking;
mod webhooks;
