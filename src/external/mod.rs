pub mod here_maps;
