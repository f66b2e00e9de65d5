mod assembly;
mod element;
