mod autofix;
mod canonical;
mod ops;
