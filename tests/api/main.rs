mod approval;
mod helpers;
