mod preflight;
mod run;
